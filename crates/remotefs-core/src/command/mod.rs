// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! File commands
//!
//! Each command implements one operation against a single remote session.
//! Commands keep no state between invocations; what they share is the
//! [`CommandContext`] helper below (path resolution, attribute lookup, lock
//! acquisition and parent directory handling).

mod delete;
mod list;
mod mkdir;
mod read;
mod rename;
mod write;

pub use delete::DeleteCommand;
pub use list::ListCommand;
pub use mkdir::MkdirCommand;
pub use read::{ReadCommand, ReadResult};
pub use rename::RenameCommand;
pub use write::WriteCommand;

use crate::config::FsConfig;
use crate::error::{FsError, FsResult};
use crate::lock::{LockRegistry, PathLock};
use crate::path;
use crate::session::RemoteSession;
use crate::types::FileAttributes;

/// What every command needs: the filesystem's lock table and settings, and
/// exclusive use of one session for the duration of the command
pub struct CommandContext<'a, S: RemoteSession + ?Sized> {
    locks: &'a LockRegistry,
    config: &'a FsConfig,
    session: &'a mut S,
}

impl<'a, S: RemoteSession + ?Sized> CommandContext<'a, S> {
    pub fn new(locks: &'a LockRegistry, config: &'a FsConfig, session: &'a mut S) -> Self {
        Self {
            locks,
            config,
            session,
        }
    }

    pub fn config(&self) -> &FsConfig {
        self.config
    }

    pub fn locks(&self) -> &LockRegistry {
        self.locks
    }

    /// Canonical absolute form of `raw`
    ///
    /// Only relative input costs a round trip, to ask the session for its
    /// working directory.
    pub fn resolve_path(&mut self, raw: &str) -> FsResult<String> {
        if path::is_absolute(raw) {
            return Ok(path::normalize(raw));
        }
        let cwd = self.session.working_directory().map_err(|e| {
            FsError::classify(
                "resolve",
                raw,
                format!("Could not obtain working directory to resolve path '{}'", raw),
                e,
            )
        })?;
        Ok(path::resolve(&cwd, raw))
    }

    /// Attributes of `path`, `None` if it doesn't exist
    pub fn get_file(&mut self, path: &str) -> FsResult<Option<FileAttributes>> {
        tracing::trace!(path, "stat");
        match self.session.stat(path) {
            Ok(attributes) => Ok(Some(attributes)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(FsError::classify(
                "stat",
                path,
                format!("Could not obtain attributes for path '{}'", path),
                e,
            )),
        }
    }

    /// Attributes of `path`, failing with `NotFound` if it doesn't exist
    pub fn get_existing_file(
        &mut self,
        operation: &'static str,
        path: &str,
    ) -> FsResult<FileAttributes> {
        self.get_file(path)?.ok_or_else(|| FsError::not_found(operation, path))
    }

    /// Take the lock on `path`, or a null lock after checking nobody else holds it
    pub fn acquire_lock(
        &self,
        operation: &'static str,
        path: &str,
        lock: bool,
    ) -> FsResult<PathLock> {
        if lock {
            self.locks.try_lock_for(operation, path)
        } else {
            self.locks.verify_not_locked_for(operation, path)?;
            Ok(PathLock::null())
        }
    }

    /// Create `dir` and every missing ancestor
    pub fn make_dirs(&mut self, dir: &str) -> FsResult<()> {
        for segment in path::lineage(dir) {
            match self.get_file(&segment)? {
                Some(existing) if existing.is_directory() => continue,
                Some(_) => {
                    return Err(FsError::illegal_path(
                        dir,
                        format!(
                            "Cannot create directory '{}' because '{}' is not a directory",
                            dir, segment
                        ),
                    ));
                }
                None => self.create_directory(&segment)?,
            }
        }
        Ok(())
    }

    /// One `mkdir` call, tolerating a directory that appeared in the meantime
    pub fn create_directory(&mut self, dir: &str) -> FsResult<()> {
        tracing::trace!(path = dir, "mkdir");
        match self.session.mkdir(dir) {
            Ok(()) => Ok(()),
            Err(e) if e.is_already_exists() => match self.get_file(dir)? {
                Some(existing) if existing.is_directory() => Ok(()),
                _ => Err(FsError::already_exists(
                    dir,
                    format!(
                        "Cannot create directory '{}' because a file already exists at that path",
                        dir
                    ),
                )),
            },
            Err(e) => Err(FsError::classify(
                "mkdir",
                dir,
                format!("Could not create directory '{}'", dir),
                e,
            )),
        }
    }

    /// Make sure the directory that will hold `path` exists
    pub fn assure_parent_folder_exists(
        &mut self,
        path: &str,
        create_parent_directories: bool,
    ) -> FsResult<()> {
        let Some(parent) = path::parent(path) else {
            return Ok(());
        };

        match self.get_file(parent)? {
            Some(existing) if existing.is_directory() => Ok(()),
            Some(_) => Err(FsError::illegal_path(
                path,
                format!(
                    "Cannot write to file '{}' because its parent '{}' is not a directory",
                    path, parent
                ),
            )),
            None if create_parent_directories => self.make_dirs(parent),
            None => Err(FsError::illegal_path(
                path,
                format!(
                    "Cannot write to file '{}' because path to it doesn't exist. \
                     Consider setting the 'create_parent_directories' option to 'true'",
                    path
                ),
            )),
        }
    }

    pub(crate) fn session(&mut self) -> &mut S {
        &mut *self.session
    }
}
