// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use crate::command::CommandContext;
use crate::error::{FsError, FsResult};
use crate::session::RemoteSession;
use crate::types::FileAttributes;

pub struct ListCommand<'a, S: RemoteSession + ?Sized> {
    ctx: CommandContext<'a, S>,
}

impl<'a, S: RemoteSession + ?Sized> ListCommand<'a, S> {
    pub fn new(ctx: CommandContext<'a, S>) -> Self {
        Self { ctx }
    }

    /// Entries of the directory at `path`
    ///
    /// A listable directory costs one primitive call. Only when the listing
    /// fails is the path inspected, to tell a regular file apart from other
    /// failures.
    pub fn list(&mut self, path: &str) -> FsResult<Vec<FileAttributes>> {
        let path = self.ctx.resolve_path(path)?;

        tracing::trace!(path = %path, "list");
        let entries = match self.ctx.session().list(&path) {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() || e.is_connectivity() => {
                return Err(FsError::classify(
                    "list",
                    &path,
                    format!("Could not list directory '{}'", path),
                    e,
                ));
            }
            Err(e) => {
                if let Some(existing) = self.ctx.get_file(&path)? {
                    if !existing.is_directory() {
                        return Err(FsError::illegal_path(
                            &path,
                            format!("Cannot list path '{}' because it is not a directory", path),
                        ));
                    }
                }
                return Err(FsError::classify(
                    "list",
                    &path,
                    format!("Could not list directory '{}'", path),
                    e,
                ));
            }
        };

        let entries: Vec<_> = entries
            .into_iter()
            .filter(|entry| !matches!(entry.name(), "." | ".." | ""))
            .collect();
        tracing::debug!(path = %path, count = entries.len(), "listed directory");
        Ok(entries)
    }
}
