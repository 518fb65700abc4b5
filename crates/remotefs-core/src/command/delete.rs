// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use crate::command::CommandContext;
use crate::error::{FsError, FsResult};
use crate::session::RemoteSession;
use crate::types::FileAttributes;

pub struct DeleteCommand<'a, S: RemoteSession + ?Sized> {
    ctx: CommandContext<'a, S>,
}

impl<'a, S: RemoteSession + ?Sized> DeleteCommand<'a, S> {
    pub fn new(ctx: CommandContext<'a, S>) -> Self {
        Self { ctx }
    }

    /// Remove the file or directory tree at `path`
    ///
    /// Directories are emptied depth-first before being removed. Nothing is
    /// removed while the path or anything below it is locked.
    pub fn delete(&mut self, path: &str) -> FsResult<()> {
        let path = self.ctx.resolve_path(path)?;
        let target = self.ctx.get_existing_file("delete", &path)?;
        self.ctx.locks().verify_tree_not_locked("delete", &path)?;
        delete_entry(&mut self.ctx, &target)?;
        tracing::debug!(path = %path, "deleted path");
        Ok(())
    }
}

/// Delete `entry`, recursing into directories
///
/// Children are taken from the listing, so symbolic links are removed rather
/// than followed.
pub(crate) fn delete_entry<S: RemoteSession + ?Sized>(
    ctx: &mut CommandContext<'_, S>,
    entry: &FileAttributes,
) -> FsResult<()> {
    let path = entry.path();
    ctx.locks().verify_not_locked_for("delete", path)?;

    if entry.is_directory() {
        tracing::trace!(path, "list");
        let children = ctx.session().list(path).map_err(|e| {
            FsError::classify(
                "delete",
                path,
                format!("Could not list directory '{}' for deletion", path),
                e,
            )
        })?;
        for child in children.iter().filter(|c| !matches!(c.name(), "." | "..")) {
            delete_entry(ctx, child)?;
        }
    }

    tracing::trace!(path, "delete");
    ctx.session().delete(path).map_err(|e| {
        FsError::classify(
            "delete",
            path,
            format!("Could not delete path '{}'", path),
            e,
        )
    })
}
