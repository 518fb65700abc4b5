// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Streaming read handle whose lifetime owns the path lock

use std::io::{self, Read};

use crate::error::{FsError, FsResult};
use crate::lock::PathLock;
use crate::session::RemoteReader;

type CloseHook = Box<dyn FnOnce() + Send>;

/// Byte stream over a remote file
///
/// The remote content is pulled lazily, after `read` has returned, so the lock
/// taken for the read lives as long as this stream rather than as long as the
/// call. Closing releases the remote handle, the lock and the leased session,
/// each exactly once. The stream closes itself on end-of-file, on a read error
/// and on drop; calling [`ReadStream::close`] again is a no-op.
pub struct ReadStream {
    path: String,
    reader: Option<Box<dyn RemoteReader>>,
    lock: PathLock,
    on_close: Option<CloseHook>,
}

impl ReadStream {
    pub(crate) fn new(path: String, reader: Box<dyn RemoteReader>, lock: PathLock) -> Self {
        Self {
            path,
            reader: Some(reader),
            lock,
            on_close: None,
        }
    }

    /// Run `hook` once the stream is closed, after the lock is released
    pub(crate) fn on_close(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(hook));
        self
    }

    /// Canonical path being read
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    /// Whether this stream currently holds an advisory lock
    pub fn holds_lock(&self) -> bool {
        self.lock.is_held()
    }

    pub fn close(&mut self) -> FsResult<()> {
        let Some(reader) = self.reader.take() else {
            return Ok(());
        };

        let result = reader.close();
        self.lock.release();
        if let Some(hook) = self.on_close.take() {
            hook();
        }
        tracing::trace!(path = %self.path, "read stream closed");

        result.map_err(|e| {
            FsError::classify(
                "read",
                &self.path,
                format!("Could not close stream for file '{}'", self.path),
                e,
            )
        })
    }

    /// Drain the remaining content into a vector and close the stream
    pub fn read_all(mut self) -> FsResult<Vec<u8>> {
        let mut buf = Vec::new();
        if let Err(e) = self.read_to_end(&mut buf) {
            return Err(FsError::classify(
                "read",
                &self.path,
                format!("Exception was found reading file '{}'", self.path),
                e.into(),
            ));
        }
        self.close()?;
        Ok(buf)
    }
}

impl Read for ReadStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(0);
        };

        match reader.read(buf) {
            Ok(0) if !buf.is_empty() => {
                self.close().map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => {
                if let Err(close_err) = self.close() {
                    tracing::warn!(path = %self.path, error = %close_err, "failed to close stream after read error");
                }
                Err(e)
            }
        }
    }
}

impl Drop for ReadStream {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(path = %self.path, error = %e, "failed to close abandoned read stream");
        }
    }
}

impl std::fmt::Debug for ReadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadStream")
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .field("lock", &self.lock)
            .finish()
    }
}
