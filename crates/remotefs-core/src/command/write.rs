// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::io::{self, Read};

use crate::command::CommandContext;
use crate::error::{FsError, FsResult, SessionError};
use crate::session::RemoteSession;
use crate::types::WriteMode;

/// Caller's content, remembering whether reading it failed
///
/// `io::copy` reports read and write failures alike; this tells a broken local
/// source apart from a broken remote sink.
struct ContentReader<'r> {
    inner: &'r mut dyn Read,
    failed: bool,
}

impl Read for ContentReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf) {
            Err(e) if e.kind() != io::ErrorKind::Interrupted => {
                self.failed = true;
                Err(e)
            }
            other => other,
        }
    }
}

/// Writes content to a remote file according to a [`WriteMode`]
pub struct WriteCommand<'a, S: RemoteSession + ?Sized> {
    ctx: CommandContext<'a, S>,
}

impl<'a, S: RemoteSession + ?Sized> WriteCommand<'a, S> {
    pub fn new(ctx: CommandContext<'a, S>) -> Self {
        Self { ctx }
    }

    /// Copy all of `content` to `path`
    ///
    /// Steps run in order: stat, create missing parents, lock, open, copy,
    /// close, unlock. A failure after the remote file was opened may leave a
    /// partial file behind; nothing is rolled back.
    pub fn write(
        &mut self,
        path: &str,
        content: &mut dyn Read,
        mode: WriteMode,
        lock: bool,
        create_parent_directories: bool,
        encoding: Option<&str>,
    ) -> FsResult<u64> {
        let path = self.ctx.resolve_path(path)?;
        let encoding = encoding.unwrap_or(&self.ctx.config().default_encoding).to_string();

        match self.ctx.get_file(&path)? {
            None => self.ctx.assure_parent_folder_exists(&path, create_parent_directories)?,
            Some(existing) if existing.is_directory() => {
                return Err(FsError::illegal_path(
                    &path,
                    format!("Cannot write file to path '{}' because it is a directory", path),
                ));
            }
            Some(_) if mode == WriteMode::CreateNew => {
                return Err(FsError::already_exists_for_write(&path, mode));
            }
            Some(_) => {}
        }

        let mut path_lock = self.ctx.acquire_lock("write", &path, lock)?;
        let result = self.copy(&path, content, mode);
        path_lock.release();

        let written = result?;
        tracing::debug!(
            path = %path,
            %mode,
            encoding = %encoding,
            bytes = written,
            "Successfully wrote to path {}",
            path
        );
        Ok(written)
    }

    fn copy(&mut self, path: &str, content: &mut dyn Read, mode: WriteMode) -> FsResult<u64> {
        tracing::trace!(path, %mode, "open_write");
        let mut writer = self.ctx.session().open_write(path, mode).map_err(|e| {
            if mode == WriteMode::CreateNew && e.is_already_exists() {
                FsError::already_exists_for_write(path, mode)
            } else {
                FsError::classify(
                    "write",
                    path,
                    format!("Could not open stream to write to path '{}' using mode '{}'", path, mode),
                    e,
                )
            }
        })?;

        let mut reader = ContentReader {
            inner: content,
            failed: false,
        };
        let copied = io::copy(&mut reader, &mut writer);
        let closed = writer.close();

        let wrap = |e: SessionError| {
            FsError::classify(
                "write",
                path,
                format!("Exception was found writing to file '{}'", path),
                e,
            )
        };

        match (copied, closed) {
            (Ok(written), Ok(())) => Ok(written),
            (Ok(_), Err(e)) => Err(wrap(e)),
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    tracing::warn!(path, error = %close_err, "failed to close remote file after write error");
                }
                if reader.failed {
                    // Local failure, never a lost connection
                    return Err(FsError::Wrapped {
                        operation: "write",
                        path: path.to_string(),
                        message: format!("Could not read the content to write to file '{}'", path),
                        source: SessionError::Io(e),
                    });
                }
                Err(wrap(e.into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FsConfig;
    use crate::error::{ErrorKind, SessionError, SessionResult};
    use crate::lock::LockRegistry;
    use crate::session::{MockRemoteSession, RemoteWriter};
    use crate::types::{FileAttributes, FileType};
    use chrono::Utc;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct FailingWriter {
        closed: Arc<AtomicBool>,
    }

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk quota exceeded"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl RemoteWriter for FailingWriter {
        fn close(self: Box<Self>) -> SessionResult<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct SinkWriter;

    impl Write for SinkWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl RemoteWriter for SinkWriter {
        fn close(self: Box<Self>) -> SessionResult<()> {
            Ok(())
        }
    }

    struct BrokenContent;

    impl Read for BrokenContent {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::ConnectionReset))
        }
    }

    fn regular(path: &str) -> FileAttributes {
        FileAttributes::new(path, 1, Utc::now(), FileType::RegularFile)
    }

    fn dir(path: &str) -> FileAttributes {
        FileAttributes::new(path, 0, Utc::now(), FileType::Directory)
    }

    #[test]
    fn primitive_calls_follow_documented_order() {
        let locks = LockRegistry::new();
        let config = FsConfig::default();
        let mut session = MockRemoteSession::new();
        let mut seq = Sequence::new();

        session
            .expect_stat()
            .with(eq("/a/b/f.txt"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(SessionError::NotFound));
        session
            .expect_stat()
            .with(eq("/a/b"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(SessionError::NotFound));
        session
            .expect_stat()
            .with(eq("/a"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|p| Ok(dir(p)));
        session
            .expect_stat()
            .with(eq("/a/b"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(SessionError::NotFound));
        session
            .expect_mkdir()
            .with(eq("/a/b"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        session
            .expect_open_write()
            .with(eq("/a/b/f.txt"), eq(WriteMode::CreateNew))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(Box::new(SinkWriter)));

        let ctx = CommandContext::new(&locks, &config, &mut session);
        let written = WriteCommand::new(ctx)
            .write("/a/b/f.txt", &mut &b"hello"[..], WriteMode::CreateNew, true, true, None)
            .unwrap();
        assert_eq!(written, 5);
        assert!(!locks.is_locked("/a/b/f.txt"));
    }

    #[test]
    fn copy_failure_closes_handle_and_releases_lock() {
        let locks = LockRegistry::new();
        let config = FsConfig::default();
        let closed = Arc::new(AtomicBool::new(false));
        let observed = closed.clone();
        let mut session = MockRemoteSession::new();
        session
            .expect_stat()
            .with(eq("/f"))
            .returning(|p| Ok(FileAttributes::new(p, 1, Utc::now(), FileType::RegularFile)));
        session
            .expect_open_write()
            .times(1)
            .returning(move |_, _| Ok(Box::new(FailingWriter { closed: closed.clone() })));

        let ctx = CommandContext::new(&locks, &config, &mut session);
        let err = WriteCommand::new(ctx)
            .write("/f", &mut &b"data"[..], WriteMode::Overwrite, true, false, None)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Wrapped);
        assert!(err.to_string().contains("Exception was found writing to file '/f'"));
        assert!(observed.load(Ordering::SeqCst));
        assert!(!locks.is_locked("/f"));
    }

    #[test]
    fn exclusive_create_race_is_reported_as_already_exists() {
        let locks = LockRegistry::new();
        let config = FsConfig::default();
        let mut session = MockRemoteSession::new();
        session.expect_stat().with(eq("/new")).returning(|_| Err(SessionError::NotFound));
        session.expect_stat().with(eq("/")).returning(|p| Ok(dir(p)));
        session.expect_open_write().returning(|_, _| Err(SessionError::AlreadyExists));

        let ctx = CommandContext::new(&locks, &config, &mut session);
        let err = WriteCommand::new(ctx)
            .write("/new", &mut &b"x"[..], WriteMode::CreateNew, false, false, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileAlreadyExists);
    }

    #[test]
    fn writing_onto_directory_is_illegal() {
        let locks = LockRegistry::new();
        let config = FsConfig::default();
        let mut session = MockRemoteSession::new();
        session.expect_stat().returning(|p| Ok(dir(p)));
        session.expect_open_write().never();

        let ctx = CommandContext::new(&locks, &config, &mut session);
        let err = WriteCommand::new(ctx)
            .write("/dir", &mut &b"x"[..], WriteMode::Overwrite, false, false, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalPath);
    }

    #[test]
    fn connectivity_loss_on_stat_is_not_mistaken_for_absence() {
        let locks = LockRegistry::new();
        let config = FsConfig::default();
        let mut session = MockRemoteSession::new();
        session
            .expect_stat()
            .returning(|_| Err(SessionError::Disconnected("connection reset".into())));
        session.expect_mkdir().never();
        session.expect_open_write().never();

        let ctx = CommandContext::new(&locks, &config, &mut session);
        let err = WriteCommand::new(ctx)
            .write("/f", &mut &b"x"[..], WriteMode::Overwrite, false, true, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connectivity);
    }

    #[test]
    fn failing_content_is_not_reported_as_lost_connection() {
        let locks = LockRegistry::new();
        let config = FsConfig::default();
        let closed = Arc::new(AtomicBool::new(false));
        let observed = closed.clone();
        let mut session = MockRemoteSession::new();
        session.expect_stat().returning(|p| Ok(regular(p)));
        session
            .expect_open_write()
            .times(1)
            .returning(move |_, _| Ok(Box::new(FailingWriter { closed: closed.clone() })));

        let ctx = CommandContext::new(&locks, &config, &mut session);
        let err = WriteCommand::new(ctx)
            .write("/f", &mut BrokenContent, WriteMode::Overwrite, true, false, None)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Wrapped);
        assert!(err.to_string().contains("Could not read the content to write to file '/f'"));
        assert!(observed.load(Ordering::SeqCst));
        assert!(!locks.is_locked("/f"));
    }

    #[test]
    fn held_path_is_refused_before_opening_for_either_lock_flag() {
        for lock in [true, false] {
            let locks = LockRegistry::new();
            let config = FsConfig::default();
            let _held = locks.try_lock_for("read", "/busy").unwrap();
            let mut session = MockRemoteSession::new();
            session.expect_stat().returning(|p| Ok(regular(p)));
            session.expect_open_write().never();

            let ctx = CommandContext::new(&locks, &config, &mut session);
            let err = WriteCommand::new(ctx)
                .write("/busy", &mut &b"x"[..], WriteMode::Overwrite, lock, false, None)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::AlreadyLocked);
            assert_eq!(err.operation(), Some("write"));
            assert!(locks.is_locked("/busy"));
        }
    }
}
