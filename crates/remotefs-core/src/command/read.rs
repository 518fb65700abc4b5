// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use crate::command::CommandContext;
use crate::error::{FsError, FsResult};
use crate::media;
use crate::session::RemoteSession;
use crate::stream::ReadStream;
use crate::types::FileAttributes;

/// Output of a read: the lazy content plus what was known about the file when
/// the read started
#[derive(Debug)]
pub struct ReadResult {
    pub stream: ReadStream,
    pub attributes: FileAttributes,
    /// Best-effort media type, `None` when it can't be determined
    pub media_type: Option<String>,
}

/// Opens a remote file for streaming, optionally under an advisory lock
pub struct ReadCommand<'a, S: RemoteSession + ?Sized> {
    ctx: CommandContext<'a, S>,
}

impl<'a, S: RemoteSession + ?Sized> ReadCommand<'a, S> {
    pub fn new(ctx: CommandContext<'a, S>) -> Self {
        Self { ctx }
    }

    /// Open `path` for reading
    ///
    /// With `lock` the path is locked until the returned stream is closed.
    /// Without it, the read still refuses a path some other operation holds.
    pub fn read(&mut self, path: &str, lock: bool) -> FsResult<ReadResult> {
        let path = self.ctx.resolve_path(path)?;
        let attributes = self.ctx.get_existing_file("read", &path)?;
        if attributes.is_directory() {
            return Err(FsError::CannotReadDirectory { path });
        }

        let mut path_lock = self.ctx.acquire_lock("read", &path, lock)?;

        tracing::trace!(path = %path, "open_read");
        let reader = match self.ctx.session().open_read(&path) {
            Ok(reader) => reader,
            Err(e) => {
                path_lock.release();
                return Err(FsError::classify(
                    "read",
                    &path,
                    format!("Could not open stream to read file '{}'", path),
                    e,
                ));
            }
        };

        let media_type = media::resolve_media_type(&attributes, self.ctx.config());
        tracing::debug!(path = %path, lock, size = attributes.size(), "opened file for reading");

        Ok(ReadResult {
            stream: ReadStream::new(path, reader, path_lock),
            attributes,
            media_type,
        })
    }
}
