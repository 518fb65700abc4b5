// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for the remote file command layer
//!
//! Two layers of errors exist. [`SessionError`] is what a primitive remote call
//! reports; [`FsError`] is what a file operation reports after the command layer
//! has classified the failure and attached the canonical path and operation.

use std::io;

use crate::types::WriteMode;

/// Failure of a single primitive call on a remote session
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("no such file")]
    NotFound,
    #[error("file already exists")]
    AlreadyExists,
    #[error("permission denied")]
    PermissionDenied,
    #[error("session disconnected: {0}")]
    Disconnected(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Other(String),
}

pub type SessionResult<T> = Result<T, SessionError>;

impl SessionError {
    pub fn is_not_found(&self) -> bool {
        match self {
            SessionError::NotFound => true,
            SessionError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }

    pub fn is_already_exists(&self) -> bool {
        match self {
            SessionError::AlreadyExists => true,
            SessionError::Io(e) => e.kind() == io::ErrorKind::AlreadyExists,
            _ => false,
        }
    }

    pub fn is_connectivity(&self) -> bool {
        match self {
            SessionError::Disconnected(_) => true,
            SessionError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

/// Fieldless discriminant of [`FsError`], handy for matching in callers and tests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    IllegalPath,
    FileAlreadyExists,
    CannotReadDirectory,
    AlreadyLocked,
    Connectivity,
    Wrapped,
}

/// File operation error
#[derive(thiserror::Error, Debug)]
pub enum FsError {
    #[error("Cannot {operation} path '{path}' because it doesn't exist")]
    NotFound { operation: &'static str, path: String },

    #[error("{message}")]
    IllegalPath { path: String, message: String },

    #[error("{message}")]
    FileAlreadyExists { path: String, message: String },

    #[error("Cannot read path '{path}' because it is a directory")]
    CannotReadDirectory { path: String },

    #[error("Cannot {operation} path '{path}' because it's locked by another operation")]
    AlreadyLocked { operation: &'static str, path: String },

    #[error("Lost connection while trying to {operation} '{path}': {source}")]
    Connectivity {
        operation: &'static str,
        path: String,
        #[source]
        source: SessionError,
    },

    #[error("{message}")]
    Wrapped {
        operation: &'static str,
        path: String,
        message: String,
        #[source]
        source: SessionError,
    },
}

pub type FsResult<T> = Result<T, FsError>;

impl FsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FsError::NotFound { .. } => ErrorKind::NotFound,
            FsError::IllegalPath { .. } => ErrorKind::IllegalPath,
            FsError::FileAlreadyExists { .. } => ErrorKind::FileAlreadyExists,
            FsError::CannotReadDirectory { .. } => ErrorKind::CannotReadDirectory,
            FsError::AlreadyLocked { .. } => ErrorKind::AlreadyLocked,
            FsError::Connectivity { .. } => ErrorKind::Connectivity,
            FsError::Wrapped { .. } => ErrorKind::Wrapped,
        }
    }

    /// Canonical path the failed operation was working on
    pub fn path(&self) -> &str {
        match self {
            FsError::NotFound { path, .. }
            | FsError::IllegalPath { path, .. }
            | FsError::FileAlreadyExists { path, .. }
            | FsError::CannotReadDirectory { path }
            | FsError::AlreadyLocked { path, .. }
            | FsError::Connectivity { path, .. }
            | FsError::Wrapped { path, .. } => path,
        }
    }

    /// Operation that failed, where the variant records one
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            FsError::NotFound { operation, .. }
            | FsError::AlreadyLocked { operation, .. }
            | FsError::Connectivity { operation, .. }
            | FsError::Wrapped { operation, .. } => Some(*operation),
            _ => None,
        }
    }

    pub(crate) fn not_found(operation: &'static str, path: &str) -> Self {
        FsError::NotFound {
            operation,
            path: path.to_string(),
        }
    }

    pub(crate) fn already_locked(operation: &'static str, path: &str) -> Self {
        FsError::AlreadyLocked {
            operation,
            path: path.to_string(),
        }
    }

    pub(crate) fn already_exists_for_write(path: &str, mode: WriteMode) -> Self {
        Self::already_exists(
            path,
            format!(
                "Cannot write to path '{}' because it already exists and write mode '{}' was selected. \
                 Use a different write mode or point to a path which doesn't exist",
                path, mode
            ),
        )
    }

    pub(crate) fn already_exists(path: &str, message: impl Into<String>) -> Self {
        FsError::FileAlreadyExists {
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn illegal_path(path: &str, message: impl Into<String>) -> Self {
        FsError::IllegalPath {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Classify a primitive-call failure into the taxonomy
    ///
    /// `message` describes what was being attempted and is used for the
    /// wrapped variant only; the other variants have fixed messages.
    pub(crate) fn classify(
        operation: &'static str,
        path: &str,
        message: impl Into<String>,
        source: SessionError,
    ) -> Self {
        if source.is_connectivity() {
            FsError::Connectivity {
                operation,
                path: path.to_string(),
                source,
            }
        } else if source.is_not_found() {
            FsError::not_found(operation, path)
        } else {
            FsError::Wrapped {
                operation,
                path: path.to_string(),
                message: message.into(),
                source,
            }
        }
    }
}
