// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Advisory path locks
//!
//! Remote file protocols of the SFTP family have no lock call, so exclusivity
//! is tracked client-side in a table keyed by canonical path. The table belongs
//! to one filesystem instance: it keeps two operations issued through the same
//! instance apart, and does nothing against other processes or other instances
//! writing the same remote path.
//!
//! Entries never expire. A lock whose owner is never closed (for example a read
//! stream that is kept alive or forgotten) blocks that path until the registry
//! itself is dropped.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{FsError, FsResult};
use crate::path;

type LockTable = Arc<Mutex<HashSet<String>>>;

fn table_guard(table: &LockTable) -> MutexGuard<'_, HashSet<String>> {
    // Each critical section is a single insert/remove/lookup, so a poisoned
    // table is still consistent.
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Registry of canonical paths currently held by an operation
#[derive(Clone, Debug, Default)]
pub struct LockRegistry {
    held: LockTable,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `path` as held, failing immediately if it already is
    pub fn try_lock(&self, path: &str) -> FsResult<PathLock> {
        self.try_lock_for("lock", path)
    }

    /// [`try_lock`](Self::try_lock) on behalf of `operation`, which is named in the denial
    pub fn try_lock_for(&self, operation: &'static str, path: &str) -> FsResult<PathLock> {
        let mut held = table_guard(&self.held);
        if !held.insert(path.to_string()) {
            tracing::debug!(operation, path, "lock denied, path already held");
            return Err(FsError::already_locked(operation, path));
        }
        tracing::trace!(operation, path, "lock acquired");
        Ok(PathLock::Active(ActiveLock {
            path: path.to_string(),
            table: self.held.clone(),
            released: false,
        }))
    }

    /// Fail with `AlreadyLocked` if some operation holds `path`
    pub fn verify_not_locked(&self, path: &str) -> FsResult<()> {
        self.verify_not_locked_for("access", path)
    }

    pub fn verify_not_locked_for(&self, operation: &'static str, path: &str) -> FsResult<()> {
        if self.is_locked(path) {
            return Err(FsError::already_locked(operation, path));
        }
        Ok(())
    }

    /// Fail with `AlreadyLocked` if `path` or anything below it is held
    ///
    /// The reported path is the held one, which may be a descendant of `path`.
    pub fn verify_tree_not_locked(&self, operation: &'static str, path: &str) -> FsResult<()> {
        let held = table_guard(&self.held);
        let mut blocking: Vec<&String> = held
            .iter()
            .filter(|key| key.as_str() == path || path::is_within(key, path))
            .collect();
        blocking.sort();
        match blocking.first() {
            Some(key) => {
                tracing::debug!(operation, path, held = %key, "tree holds a lock");
                Err(FsError::already_locked(operation, key))
            }
            None => Ok(()),
        }
    }

    pub fn is_locked(&self, path: &str) -> bool {
        table_guard(&self.held).contains(path)
    }

    /// Release a lock; released and null locks are ignored
    pub fn release(&self, lock: &mut PathLock) {
        lock.release();
    }

    /// Number of paths currently held
    pub fn held_count(&self) -> usize {
        table_guard(&self.held).len()
    }
}

/// Lock held by an operation for its lifetime
#[derive(Debug)]
pub enum PathLock {
    Active(ActiveLock),
    /// Used when the caller did not ask for locking
    Null,
}

impl PathLock {
    pub fn null() -> Self {
        PathLock::Null
    }

    /// Path held by this lock, `None` for a null lock
    pub fn path(&self) -> Option<&str> {
        match self {
            PathLock::Active(lock) => Some(&lock.path),
            PathLock::Null => None,
        }
    }

    /// Whether this lock still holds a registry entry
    pub fn is_held(&self) -> bool {
        matches!(self, PathLock::Active(lock) if !lock.released)
    }

    pub fn release(&mut self) {
        if let PathLock::Active(lock) = self {
            lock.release();
        }
    }
}

/// Registry-backed lock on one canonical path
#[derive(Debug)]
pub struct ActiveLock {
    path: String,
    table: LockTable,
    released: bool,
}

impl ActiveLock {
    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        table_guard(&self.table).remove(&self.path);
        tracing::trace!(path = %self.path, "lock released");
    }
}

impl Drop for ActiveLock {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn second_lock_on_same_path_is_denied() {
        let registry = LockRegistry::new();
        let _first = registry.try_lock("/a").unwrap();
        let err = registry.try_lock("/a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyLocked);
        assert_eq!(err.path(), "/a");
    }

    #[test]
    fn different_paths_lock_independently() {
        let registry = LockRegistry::new();
        let _a = registry.try_lock("/a").unwrap();
        let _b = registry.try_lock("/b").unwrap();
        assert_eq!(registry.held_count(), 2);
    }

    #[test]
    fn release_is_idempotent() {
        let registry = LockRegistry::new();
        let mut lock = registry.try_lock("/a").unwrap();
        assert!(lock.is_held());
        registry.release(&mut lock);
        registry.release(&mut lock);
        assert!(!lock.is_held());
        assert!(!registry.is_locked("/a"));

        // A stale release must not free a lock someone else took since.
        let _other = registry.try_lock("/a").unwrap();
        lock.release();
        assert!(registry.is_locked("/a"));
    }

    #[test]
    fn null_lock_never_touches_registry() {
        let registry = LockRegistry::new();
        let mut lock = PathLock::null();
        assert_eq!(lock.path(), None);
        assert!(!lock.is_held());
        registry.release(&mut lock);
        assert_eq!(registry.held_count(), 0);
    }

    #[test]
    fn verify_not_locked_reports_held_paths() {
        let registry = LockRegistry::new();
        registry.verify_not_locked("/a").unwrap();
        let lock = registry.try_lock("/a").unwrap();
        assert_eq!(
            registry.verify_not_locked("/a").unwrap_err().kind(),
            ErrorKind::AlreadyLocked
        );
        drop(lock);
        registry.verify_not_locked("/a").unwrap();
    }

    #[test]
    fn denial_names_the_requesting_operation() {
        let registry = LockRegistry::new();
        let _held = registry.try_lock_for("read", "/a").unwrap();
        let err = registry.try_lock_for("write", "/a").unwrap_err();
        assert_eq!(err.operation(), Some("write"));
        let err = registry.verify_not_locked_for("delete", "/a").unwrap_err();
        assert_eq!(err.operation(), Some("delete"));
    }

    #[test]
    fn tree_check_sees_locked_descendants() {
        let registry = LockRegistry::new();
        let _held = registry.try_lock("/d/sub/f").unwrap();

        let err = registry.verify_tree_not_locked("rename", "/d").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyLocked);
        assert_eq!(err.path(), "/d/sub/f");
        assert!(registry.verify_tree_not_locked("rename", "/").is_err());
        assert!(registry.verify_tree_not_locked("rename", "/d/sub/f").is_err());

        // Sibling with a shared name prefix
        registry.verify_tree_not_locked("rename", "/d/su").unwrap();
        registry.verify_tree_not_locked("rename", "/e").unwrap();
    }

    #[test]
    fn dropping_an_active_lock_releases_it() {
        let registry = LockRegistry::new();
        {
            let _lock = registry.try_lock("/scoped").unwrap();
            assert!(registry.is_locked("/scoped"));
        }
        assert!(!registry.is_locked("/scoped"));
    }

    #[test]
    fn forgotten_lock_stays_held() {
        let registry = LockRegistry::new();
        std::mem::forget(registry.try_lock("/leaked").unwrap());
        assert!(registry.is_locked("/leaked"));
        assert!(registry.try_lock("/leaked").is_err());
    }

    #[test]
    fn concurrent_lockers_get_exactly_one_winner() {
        let registry = LockRegistry::new();
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let registry = registry.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    // Keep the lock alive until every thread has tried.
                    let result = registry.try_lock("/contended");
                    barrier.wait();
                    result.is_ok()
                })
            })
            .collect();

        let winners = handles.into_iter().map(|h| h.join().unwrap()).filter(|won| *won).count();
        assert_eq!(winners, 1);
        assert!(!registry.is_locked("/contended"));
    }
}
