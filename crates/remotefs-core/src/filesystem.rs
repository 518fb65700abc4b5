// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Operation API over a connection provider

use std::io::Read;
use std::sync::Arc;

use crate::command::{
    CommandContext, DeleteCommand, ListCommand, MkdirCommand, ReadCommand, ReadResult,
    RenameCommand, WriteCommand,
};
use crate::config::FsConfig;
use crate::error::{FsError, FsResult};
use crate::lock::LockRegistry;
use crate::path;
use crate::session::{ConnectionProvider, RemoteSession};
use crate::types::{FileAttributes, WriteMode};

/// Options of a single write
#[derive(Clone, Debug, Default)]
pub struct WriteOptions {
    pub mode: WriteMode,
    /// Hold the path lock while the content is copied
    pub lock: bool,
    pub create_parent_directories: bool,
    /// Label recorded with the write; defaults to the configured encoding
    pub encoding: Option<String>,
}

impl WriteOptions {
    pub fn with_mode(mode: WriteMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }
}

/// Remote file system
///
/// Every operation leases a session from the provider, runs one command on it
/// and hands the session back. A read keeps its session until the returned
/// stream is closed. The lock registry is shared by all operations issued
/// through this instance (and its clones).
pub struct RemoteFileSystem<P: ConnectionProvider> {
    provider: Arc<P>,
    locks: LockRegistry,
    config: FsConfig,
}

impl<P: ConnectionProvider> Clone for RemoteFileSystem<P> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            locks: self.locks.clone(),
            config: self.config.clone(),
        }
    }
}

impl<P: ConnectionProvider + 'static> RemoteFileSystem<P> {
    pub fn new(provider: P, config: FsConfig) -> Self {
        Self {
            provider: Arc::new(provider),
            locks: LockRegistry::new(),
            config,
        }
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn lease(&self, operation: &'static str, path: &str) -> FsResult<P::Session> {
        let mut session = self.provider.connect().map_err(|source| FsError::Connectivity {
            operation,
            path: path.to_string(),
            source,
        })?;

        if let Some(dir) = &self.config.working_dir {
            if let Err(e) = session.set_working_directory(dir) {
                self.provider.disconnect(session);
                return Err(FsError::classify(
                    operation,
                    path,
                    format!("Could not change working directory to '{}'", dir),
                    e,
                ));
            }
        }
        Ok(session)
    }

    fn with_session<T>(
        &self,
        operation: &'static str,
        path: &str,
        run: impl FnOnce(CommandContext<'_, P::Session>) -> FsResult<T>,
    ) -> FsResult<T> {
        let mut session = self.lease(operation, path)?;
        let result = run(CommandContext::new(&self.locks, &self.config, &mut session));
        self.provider.disconnect(session);
        if let Err(e) = &result {
            tracing::debug!(operation, path, error = %e, "operation failed");
        }
        result
    }

    /// Open `path` for streaming
    ///
    /// The session stays leased, and the lock (if requested) held, until the
    /// returned stream is closed or dropped.
    pub fn read(&self, path: &str, lock: bool) -> FsResult<ReadResult> {
        let mut session = self.lease("read", path)?;
        let result = {
            let ctx = CommandContext::new(&self.locks, &self.config, &mut session);
            ReadCommand::new(ctx).read(path, lock)
        };

        match result {
            Ok(ReadResult {
                stream,
                attributes,
                media_type,
            }) => {
                let provider = self.provider.clone();
                Ok(ReadResult {
                    stream: stream.on_close(move || provider.disconnect(session)),
                    attributes,
                    media_type,
                })
            }
            Err(e) => {
                self.provider.disconnect(session);
                Err(e)
            }
        }
    }

    /// Copy `content` to `path`, returning the number of bytes written
    pub fn write(&self, path: &str, content: &mut dyn Read, options: &WriteOptions) -> FsResult<u64> {
        self.with_session("write", path, |ctx| {
            WriteCommand::new(ctx).write(
                path,
                content,
                options.mode,
                options.lock,
                options.create_parent_directories,
                options.encoding.as_deref(),
            )
        })
    }

    pub fn list(&self, path: &str) -> FsResult<Vec<FileAttributes>> {
        self.with_session("list", path, |ctx| ListCommand::new(ctx).list(path))
    }

    pub fn mkdir(&self, path: &str) -> FsResult<()> {
        self.with_session("mkdir", path, |ctx| MkdirCommand::new(ctx).mkdir(path))
    }

    pub fn delete(&self, path: &str) -> FsResult<()> {
        self.with_session("delete", path, |ctx| DeleteCommand::new(ctx).delete(path))
    }

    pub fn rename(&self, from: &str, to: &str, overwrite: bool) -> FsResult<()> {
        self.with_session("rename", from, |ctx| {
            RenameCommand::new(ctx).rename(from, to, overwrite)
        })
    }

    /// Attributes of `path`, following symbolic links
    pub fn stat(&self, path: &str) -> FsResult<FileAttributes> {
        self.with_session("stat", path, |mut ctx| {
            let resolved = ctx.resolve_path(path)?;
            ctx.get_existing_file("stat", &resolved)
        })
    }

    /// Whether an operation holds the lock on the absolute `path`
    pub fn is_locked(&self, path: &str) -> bool {
        self.locks.is_locked(&path::normalize(path))
    }

    /// Fail with `AlreadyLocked` if an operation holds the absolute `path`
    pub fn verify_not_locked(&self, path: &str) -> FsResult<()> {
        self.locks.verify_not_locked(&path::normalize(path))
    }
}

impl<P: ConnectionProvider> std::fmt::Debug for RemoteFileSystem<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFileSystem")
            .field("locks", &self.locks)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, SessionError, SessionResult};
    use crate::session::MockRemoteSession;

    struct FailingProvider;

    impl ConnectionProvider for FailingProvider {
        type Session = MockRemoteSession;

        fn connect(&self) -> SessionResult<MockRemoteSession> {
            Err(SessionError::Disconnected("connection refused".into()))
        }
    }

    #[test]
    fn connect_failure_is_connectivity() {
        let fs = RemoteFileSystem::new(FailingProvider, FsConfig::default());
        let err = fs.list("/").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connectivity);
        assert_eq!(err.path(), "/");
    }

    #[test]
    fn lock_inspection_uses_canonical_form() {
        let fs = RemoteFileSystem::new(FailingProvider, FsConfig::default());
        let _held = fs.locks().try_lock("/a/b").unwrap();
        assert!(fs.is_locked("/a//b/"));
        assert_eq!(fs.verify_not_locked("/a/./b").unwrap_err().kind(), ErrorKind::AlreadyLocked);
        assert!(fs.verify_not_locked("/a").is_ok());
    }
}
