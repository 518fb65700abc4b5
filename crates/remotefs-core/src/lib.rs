// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! File command layer over session-oriented remote file protocols.
//!
//! This crate provides:
//! - Read, write, list, mkdir, delete, rename and stat operations built from
//!   primitive calls of an SFTP-like session
//! - Advisory path locks scoped to one filesystem instance
//! - Remote path resolution against a session working directory
//! - An error taxonomy that tells missing paths, illegal targets, lock
//!   contention and lost connections apart
//! - A host-directory session for development and an in-memory server for tests

pub mod command;
pub mod config;
pub mod error;
pub mod fault;
pub mod filesystem;
pub mod host;
pub mod lock;
pub mod media;
pub mod path;
pub mod session;
pub mod stream;
pub mod testing;
pub mod types;

/// Re-export key types for convenience
pub use command::ReadResult;
pub use config::FsConfig;
pub use error::{ErrorKind, FsError, FsResult, SessionError, SessionResult};
pub use filesystem::{RemoteFileSystem, WriteOptions};
pub use host::{HostFsConnectionProvider, HostFsSession};
pub use lock::{LockRegistry, PathLock};
pub use session::{ConnectionProvider, RemoteReader, RemoteSession, RemoteWriter};
pub use stream::ReadStream;
pub use types::{FileAttributes, FileType, WriteMode};
