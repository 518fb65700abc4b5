// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Interfaces to the remote protocol
//!
//! The command layer sees a session as an opaque handle offering primitive
//! remote calls. Transport, authentication and pooling live behind these
//! traits.

use std::io::{Read, Write};

use crate::error::SessionResult;
use crate::types::{FileAttributes, WriteMode};

/// Remote handle opened for reading
pub trait RemoteReader: Read + Send {
    /// Close the remote handle
    fn close(self: Box<Self>) -> SessionResult<()>;
}

/// Remote handle opened for writing
pub trait RemoteWriter: Write + Send {
    /// Flush pending data and close the remote handle
    fn close(self: Box<Self>) -> SessionResult<()>;
}

/// One live, authenticated connection to the remote server
///
/// Every call takes `&mut self`: a session is used by one caller at a time and
/// has at most one primitive call in flight. Callers wanting parallelism lease
/// several sessions from a [`ConnectionProvider`].
#[cfg_attr(test, mockall::automock)]
pub trait RemoteSession: Send {
    /// Attributes of `path`; `SessionError::NotFound` when it is absent
    fn stat(&mut self, path: &str) -> SessionResult<FileAttributes>;

    fn open_read(&mut self, path: &str) -> SessionResult<Box<dyn RemoteReader>>;

    /// Open `path` for writing
    ///
    /// `CreateNew` must create exclusively and fail with `AlreadyExists` when
    /// the file is present; `Append` positions at end-of-file; `Overwrite`
    /// truncates. Missing files are created in every mode.
    fn open_write(&mut self, path: &str, mode: WriteMode) -> SessionResult<Box<dyn RemoteWriter>>;

    /// Entries of a directory, without `.` and `..`
    fn list(&mut self, path: &str) -> SessionResult<Vec<FileAttributes>>;

    /// Create one directory; the parent must exist
    fn mkdir(&mut self, path: &str) -> SessionResult<()>;

    /// Remove a file or an empty directory
    fn delete(&mut self, path: &str) -> SessionResult<()>;

    fn rename(&mut self, from: &str, to: &str) -> SessionResult<()>;

    fn working_directory(&mut self) -> SessionResult<String>;

    fn set_working_directory(&mut self, path: &str) -> SessionResult<()>;
}

/// Supplies authenticated sessions on demand and takes them back
pub trait ConnectionProvider: Send + Sync {
    type Session: RemoteSession + 'static;

    fn connect(&self) -> SessionResult<Self::Session>;

    /// Take back a session once an operation (or a read stream) is done with it
    fn disconnect(&self, session: Self::Session) {
        drop(session);
    }
}
