// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! In-memory remote server
//!
//! The server keeps a tree of directories and files behind a mutex. Sessions
//! opened on it behave like sessions of an SFTP-like protocol: `mkdir` needs an
//! existing parent, `delete` refuses non-empty directories, `rename` refuses an
//! existing target and exclusive creation fails on an existing file. Read
//! handles serve content in small chunks and write handles store each chunk as
//! it arrives, so a failure injected mid-transfer leaves a partial file.

use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::error::{SessionError, SessionResult};
use crate::fault::{FaultInjector, FaultOp};
use crate::path;
use crate::session::{ConnectionProvider, RemoteReader, RemoteSession, RemoteWriter};
use crate::types::{FileAttributes, FileType, WriteMode};

/// Largest chunk returned by a single read on a read handle
pub const READ_CHUNK: usize = 4;

#[derive(Clone, Debug)]
enum Node {
    Directory { modified: DateTime<Utc> },
    File { data: Vec<u8>, modified: DateTime<Utc> },
}

impl Node {
    fn attributes(&self, path: &str) -> FileAttributes {
        match self {
            Node::Directory { modified } => {
                FileAttributes::new(path, 0, *modified, FileType::Directory)
            }
            Node::File { data, modified } => {
                FileAttributes::new(path, data.len() as u64, *modified, FileType::RegularFile)
            }
        }
    }
}

type Tree = BTreeMap<String, Node>;

#[derive(Debug)]
struct Shared {
    tree: Mutex<Tree>,
    faults: FaultInjector,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

/// Handle on an in-memory server; clones share the same tree
#[derive(Clone, Debug)]
pub struct InMemoryServer {
    shared: Arc<Shared>,
}

impl Default for InMemoryServer {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryServer {
    /// Server holding only the root directory
    pub fn new() -> Self {
        let mut tree = Tree::new();
        tree.insert(
            path::ROOT.to_string(),
            Node::Directory {
                modified: Utc::now(),
            },
        );
        Self {
            shared: Arc::new(Shared {
                tree: Mutex::new(tree),
                faults: FaultInjector::new(),
                connects: AtomicUsize::new(0),
                disconnects: AtomicUsize::new(0),
            }),
        }
    }

    fn tree(&self) -> MutexGuard<'_, Tree> {
        self.shared.tree.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fault injector consulted before every primitive call
    pub fn faults(&self) -> &FaultInjector {
        &self.shared.faults
    }

    /// Open a session whose working directory is the root
    pub fn session(&self) -> InMemorySession {
        InMemorySession {
            server: self.clone(),
            cwd: path::ROOT.to_string(),
        }
    }

    /// Create a directory and its missing ancestors directly on the server
    pub fn create_dirs(&self, dir: &str) {
        let mut tree = self.tree();
        for segment in path::lineage(&path::normalize(dir)) {
            tree.entry(segment).or_insert_with(|| Node::Directory {
                modified: Utc::now(),
            });
        }
    }

    /// Store a file directly on the server, creating missing ancestors
    pub fn put_file(&self, file: &str, content: impl Into<Vec<u8>>) {
        let file = path::normalize(file);
        if let Some(parent) = path::parent(&file) {
            self.create_dirs(parent);
        }
        self.tree().insert(
            file,
            Node::File {
                data: content.into(),
                modified: Utc::now(),
            },
        );
    }

    /// Content of a file, `None` if absent or a directory
    pub fn file_content(&self, file: &str) -> Option<Vec<u8>> {
        match self.tree().get(&path::normalize(file)) {
            Some(Node::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn exists(&self, entry: &str) -> bool {
        self.tree().contains_key(&path::normalize(entry))
    }

    pub fn is_directory(&self, entry: &str) -> bool {
        matches!(self.tree().get(&path::normalize(entry)), Some(Node::Directory { .. }))
    }

    /// Sessions handed out and not yet taken back by a provider
    pub fn open_sessions(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst) - self.shared.disconnects.load(Ordering::SeqCst)
    }
}

fn children_of<'t>(tree: &'t Tree, dir: &'t str) -> impl Iterator<Item = (&'t String, &'t Node)> + 't {
    tree.iter()
        .filter(move |(key, _)| key.as_str() != dir && path::parent(key) == Some(dir))
}

fn to_io(err: SessionError) -> io::Error {
    match err {
        SessionError::Io(e) => e,
        SessionError::Disconnected(msg) => io::Error::new(io::ErrorKind::ConnectionAborted, msg),
        other => io::Error::new(io::ErrorKind::Other, other.to_string()),
    }
}

/// Session on an [`InMemoryServer`]
#[derive(Debug)]
pub struct InMemorySession {
    server: InMemoryServer,
    cwd: String,
}

impl InMemorySession {
    fn absolute(&self, raw: &str) -> String {
        path::resolve(&self.cwd, raw)
    }

    fn check(&self, op: FaultOp) -> SessionResult<()> {
        self.server.faults().check(op)
    }

    fn require_parent_dir(tree: &Tree, target: &str) -> SessionResult<()> {
        match path::parent(target).map(|parent| tree.get(parent)) {
            None => Ok(()),
            Some(Some(Node::Directory { .. })) => Ok(()),
            Some(Some(Node::File { .. })) => Err(SessionError::Other("parent is not a directory".into())),
            Some(None) => Err(SessionError::NotFound),
        }
    }
}

impl RemoteSession for InMemorySession {
    fn stat(&mut self, raw: &str) -> SessionResult<FileAttributes> {
        self.check(FaultOp::Stat)?;
        let target = self.absolute(raw);
        let tree = self.server.tree();
        tree.get(&target)
            .map(|node| node.attributes(&target))
            .ok_or(SessionError::NotFound)
    }

    fn open_read(&mut self, raw: &str) -> SessionResult<Box<dyn RemoteReader>> {
        self.check(FaultOp::OpenRead)?;
        let target = self.absolute(raw);
        match self.server.tree().get(&target) {
            Some(Node::File { data, .. }) => Ok(Box::new(InMemoryReader {
                data: io::Cursor::new(data.clone()),
                server: self.server.clone(),
            })),
            Some(Node::Directory { .. }) => Err(SessionError::Other("is a directory".into())),
            None => Err(SessionError::NotFound),
        }
    }

    fn open_write(&mut self, raw: &str, mode: WriteMode) -> SessionResult<Box<dyn RemoteWriter>> {
        self.check(FaultOp::OpenWrite)?;
        let target = self.absolute(raw);
        let mut tree = self.server.tree();
        Self::require_parent_dir(&tree, &target)?;

        match tree.get_mut(&target) {
            Some(Node::Directory { .. }) => {
                return Err(SessionError::Other("is a directory".into()));
            }
            Some(Node::File { data, modified }) => match mode {
                WriteMode::CreateNew => return Err(SessionError::AlreadyExists),
                WriteMode::Overwrite => {
                    data.clear();
                    *modified = Utc::now();
                }
                WriteMode::Append => {}
            },
            None => {
                tree.insert(
                    target.clone(),
                    Node::File {
                        data: Vec::new(),
                        modified: Utc::now(),
                    },
                );
            }
        }

        Ok(Box::new(InMemoryWriter {
            path: target,
            server: self.server.clone(),
        }))
    }

    fn list(&mut self, raw: &str) -> SessionResult<Vec<FileAttributes>> {
        self.check(FaultOp::List)?;
        let dir = self.absolute(raw);
        let tree = self.server.tree();
        match tree.get(&dir) {
            Some(Node::Directory { .. }) => {}
            Some(Node::File { .. }) => return Err(SessionError::Other("not a directory".into())),
            None => return Err(SessionError::NotFound),
        }
        let entries = children_of(&tree, &dir)
            .map(|(key, node)| node.attributes(key))
            .collect();
        Ok(entries)
    }

    fn mkdir(&mut self, raw: &str) -> SessionResult<()> {
        self.check(FaultOp::Mkdir)?;
        let dir = self.absolute(raw);
        let mut tree = self.server.tree();
        if tree.contains_key(&dir) {
            return Err(SessionError::AlreadyExists);
        }
        Self::require_parent_dir(&tree, &dir)?;
        tree.insert(
            dir,
            Node::Directory {
                modified: Utc::now(),
            },
        );
        Ok(())
    }

    fn delete(&mut self, raw: &str) -> SessionResult<()> {
        self.check(FaultOp::Delete)?;
        let target = self.absolute(raw);
        if target == path::ROOT {
            return Err(SessionError::PermissionDenied);
        }
        let mut tree = self.server.tree();
        match tree.get(&target) {
            None => return Err(SessionError::NotFound),
            Some(Node::Directory { .. }) if children_of(&tree, &target).next().is_some() => {
                return Err(SessionError::Other("directory not empty".into()));
            }
            Some(_) => {}
        }
        tree.remove(&target);
        Ok(())
    }

    fn rename(&mut self, raw_from: &str, raw_to: &str) -> SessionResult<()> {
        self.check(FaultOp::Rename)?;
        let from = self.absolute(raw_from);
        let to = self.absolute(raw_to);
        let mut tree = self.server.tree();
        if !tree.contains_key(&from) {
            return Err(SessionError::NotFound);
        }
        if tree.contains_key(&to) {
            return Err(SessionError::AlreadyExists);
        }
        Self::require_parent_dir(&tree, &to)?;

        let prefix = format!("{}{}", from, path::SEPARATOR);
        let moved: Vec<String> = tree
            .keys()
            .filter(|key| **key == from || key.starts_with(&prefix))
            .cloned()
            .collect();
        for key in moved {
            if let Some(node) = tree.remove(&key) {
                let new_key = format!("{}{}", to, &key[from.len()..]);
                tree.insert(new_key, node);
            }
        }
        Ok(())
    }

    fn working_directory(&mut self) -> SessionResult<String> {
        Ok(self.cwd.clone())
    }

    fn set_working_directory(&mut self, raw: &str) -> SessionResult<()> {
        let dir = self.absolute(raw);
        match self.server.tree().get(&dir) {
            Some(Node::Directory { .. }) => {
                self.cwd = dir;
                Ok(())
            }
            Some(Node::File { .. }) => Err(SessionError::Other("not a directory".into())),
            None => Err(SessionError::NotFound),
        }
    }
}

struct InMemoryReader {
    data: io::Cursor<Vec<u8>>,
    server: InMemoryServer,
}

impl Read for InMemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.server.faults().check(FaultOp::Read).map_err(to_io)?;
        let len = buf.len().min(READ_CHUNK);
        self.data.read(&mut buf[..len])
    }
}

impl RemoteReader for InMemoryReader {
    fn close(self: Box<Self>) -> SessionResult<()> {
        Ok(())
    }
}

struct InMemoryWriter {
    path: String,
    server: InMemoryServer,
}

impl Write for InMemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.server.faults().check(FaultOp::Write).map_err(to_io)?;
        match self.server.tree().get_mut(&self.path) {
            Some(Node::File { data, modified }) => {
                data.extend_from_slice(buf);
                *modified = Utc::now();
                Ok(buf.len())
            }
            _ => Err(io::Error::new(io::ErrorKind::NotFound, "file vanished while writing")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl RemoteWriter for InMemoryWriter {
    fn close(self: Box<Self>) -> SessionResult<()> {
        Ok(())
    }
}

/// Provider handing out sessions on one [`InMemoryServer`]
#[derive(Clone, Debug, Default)]
pub struct InMemoryConnectionProvider {
    server: InMemoryServer,
}

impl InMemoryConnectionProvider {
    pub fn new(server: InMemoryServer) -> Self {
        Self { server }
    }

    pub fn server(&self) -> &InMemoryServer {
        &self.server
    }
}

impl ConnectionProvider for InMemoryConnectionProvider {
    type Session = InMemorySession;

    fn connect(&self) -> SessionResult<InMemorySession> {
        self.server.shared.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.server.session())
    }

    fn disconnect(&self, session: InMemorySession) {
        self.server.shared.disconnects.fetch_add(1, Ordering::SeqCst);
        drop(session);
    }
}
