// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Session serving a local directory tree as the remote root
//!
//! Used for development and by the `remotefs` CLI. Remote paths are resolved
//! against the session's working directory and normalized before they are
//! joined onto the root, so `..` never leaves the served tree. Symbolic links
//! inside the tree are followed by the host and are not confined.

use std::fs::{self, File, Metadata, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{SessionError, SessionResult};
use crate::path;
use crate::session::{ConnectionProvider, RemoteReader, RemoteSession, RemoteWriter};
use crate::types::{FileAttributes, FileType, WriteMode};

fn map_io(e: io::Error) -> SessionError {
    match e.kind() {
        io::ErrorKind::NotFound => SessionError::NotFound,
        io::ErrorKind::AlreadyExists => SessionError::AlreadyExists,
        io::ErrorKind::PermissionDenied => SessionError::PermissionDenied,
        _ => SessionError::Io(e),
    }
}

fn attributes_from(remote: &str, metadata: &Metadata) -> FileAttributes {
    let file_type = if metadata.file_type().is_symlink() {
        FileType::SymbolicLink
    } else if metadata.is_dir() {
        FileType::Directory
    } else if metadata.is_file() {
        FileType::RegularFile
    } else {
        FileType::Other
    };
    let modified = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_default();
    let size = if file_type == FileType::Directory { 0 } else { metadata.len() };
    FileAttributes::new(remote, size, modified, file_type)
}

#[derive(Debug)]
pub struct HostFsSession {
    root: PathBuf,
    cwd: String,
}

impl HostFsSession {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cwd: path::ROOT.to_string(),
        }
    }

    fn remote(&self, raw: &str) -> String {
        path::resolve(&self.cwd, raw)
    }

    fn local(&self, remote: &str) -> PathBuf {
        self.root.join(remote.trim_start_matches(path::SEPARATOR))
    }
}

impl RemoteSession for HostFsSession {
    fn stat(&mut self, raw: &str) -> SessionResult<FileAttributes> {
        let remote = self.remote(raw);
        let metadata = fs::metadata(self.local(&remote)).map_err(map_io)?;
        Ok(attributes_from(&remote, &metadata))
    }

    fn open_read(&mut self, raw: &str) -> SessionResult<Box<dyn RemoteReader>> {
        let local = self.local(&self.remote(raw));
        if local.is_dir() {
            return Err(SessionError::Other("is a directory".into()));
        }
        let file = File::open(local).map_err(map_io)?;
        Ok(Box::new(HostReader { file }))
    }

    fn open_write(&mut self, raw: &str, mode: WriteMode) -> SessionResult<Box<dyn RemoteWriter>> {
        let local = self.local(&self.remote(raw));
        let mut options = OpenOptions::new();
        match mode {
            WriteMode::CreateNew => options.write(true).create_new(true),
            WriteMode::Append => options.append(true).create(true),
            WriteMode::Overwrite => options.write(true).create(true).truncate(true),
        };
        let file = options.open(local).map_err(map_io)?;
        Ok(Box::new(HostWriter { file }))
    }

    fn list(&mut self, raw: &str) -> SessionResult<Vec<FileAttributes>> {
        let remote = self.remote(raw);
        let mut entries = Vec::new();
        for entry in fs::read_dir(self.local(&remote)).map_err(map_io)? {
            let entry = entry.map_err(map_io)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let metadata = fs::symlink_metadata(entry.path()).map_err(map_io)?;
            entries.push(attributes_from(&path::join(&remote, &name), &metadata));
        }
        entries.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(entries)
    }

    fn mkdir(&mut self, raw: &str) -> SessionResult<()> {
        fs::create_dir(self.local(&self.remote(raw))).map_err(map_io)
    }

    fn delete(&mut self, raw: &str) -> SessionResult<()> {
        let remote = self.remote(raw);
        if remote == path::ROOT {
            return Err(SessionError::PermissionDenied);
        }
        let local = self.local(&remote);
        let metadata = fs::symlink_metadata(&local).map_err(map_io)?;
        if metadata.is_dir() {
            fs::remove_dir(&local).map_err(map_io)
        } else {
            fs::remove_file(&local).map_err(map_io)
        }
    }

    fn rename(&mut self, raw_from: &str, raw_to: &str) -> SessionResult<()> {
        let from = self.local(&self.remote(raw_from));
        let to = self.local(&self.remote(raw_to));
        // Protocol renames don't replace an existing target; the host's would.
        if fs::symlink_metadata(&to).is_ok() {
            return Err(SessionError::AlreadyExists);
        }
        fs::rename(from, to).map_err(map_io)
    }

    fn working_directory(&mut self) -> SessionResult<String> {
        Ok(self.cwd.clone())
    }

    fn set_working_directory(&mut self, raw: &str) -> SessionResult<()> {
        let remote = self.remote(raw);
        let metadata = fs::metadata(self.local(&remote)).map_err(map_io)?;
        if !metadata.is_dir() {
            return Err(SessionError::Other(format!("'{}' is not a directory", remote)));
        }
        self.cwd = remote;
        Ok(())
    }
}

struct HostReader {
    file: File,
}

impl Read for HostReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl RemoteReader for HostReader {
    fn close(self: Box<Self>) -> SessionResult<()> {
        Ok(())
    }
}

struct HostWriter {
    file: File,
}

impl Write for HostWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl RemoteWriter for HostWriter {
    fn close(mut self: Box<Self>) -> SessionResult<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

/// Provider of [`HostFsSession`]s over one local directory
#[derive(Clone, Debug)]
pub struct HostFsConnectionProvider {
    root: PathBuf,
}

impl HostFsConnectionProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ConnectionProvider for HostFsConnectionProvider {
    type Session = HostFsSession;

    fn connect(&self) -> SessionResult<HostFsSession> {
        if !self.root.is_dir() {
            return Err(SessionError::Disconnected(format!(
                "served root '{}' is not a directory",
                self.root.display()
            )));
        }
        tracing::trace!(root = %self.root.display(), "host session opened");
        Ok(HostFsSession::new(self.root.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_never_escape_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let session = HostFsSession::new(dir.path());
        assert_eq!(session.local(&session.remote("/../../etc/passwd")), dir.path().join("etc/passwd"));
    }

    #[test]
    fn rename_refuses_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), "1").unwrap();
        fs::write(dir.path().join("b"), "2").unwrap();
        let mut session = HostFsSession::new(dir.path());
        assert!(session.rename("/a", "/b").unwrap_err().is_already_exists());
        assert_eq!(fs::read_to_string(dir.path().join("b")).unwrap(), "2");
    }

    #[test]
    fn list_reports_names_and_types() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("f.txt"), "abc").unwrap();
        let mut session = HostFsSession::new(dir.path());
        let entries = session.list("/").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path(), "/f.txt");
        assert_eq!(entries[0].size(), 3);
        assert!(entries[1].is_directory());
    }

    #[test]
    fn missing_root_fails_to_connect() {
        let dir = tempfile::tempdir().unwrap();
        let provider = HostFsConnectionProvider::new(dir.path().join("nope"));
        assert!(provider.connect().unwrap_err().is_connectivity());
    }
}
