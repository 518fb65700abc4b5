// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use crate::command::delete::delete_entry;
use crate::command::CommandContext;
use crate::error::{FsError, FsResult};
use crate::path;
use crate::session::RemoteSession;

pub struct RenameCommand<'a, S: RemoteSession + ?Sized> {
    ctx: CommandContext<'a, S>,
}

impl<'a, S: RemoteSession + ?Sized> RenameCommand<'a, S> {
    pub fn new(ctx: CommandContext<'a, S>) -> Self {
        Self { ctx }
    }

    /// Move `from` to `to`
    ///
    /// An existing target is replaced only when `overwrite` is set, in which
    /// case it is deleted first. The two steps are not atomic. Renaming a path
    /// onto itself is a no-op; moving a path into its own subtree or onto one
    /// of its ancestors is illegal. Nothing happens while the source, the
    /// target or anything below either of them is locked.
    pub fn rename(&mut self, from: &str, to: &str, overwrite: bool) -> FsResult<()> {
        let from = self.ctx.resolve_path(from)?;
        let to = self.ctx.resolve_path(to)?;

        self.ctx.get_existing_file("rename", &from)?;
        self.ctx.locks().verify_tree_not_locked("rename", &from)?;

        if from == to {
            tracing::debug!(path = %from, "rename onto itself, nothing to do");
            return Ok(());
        }
        if path::is_within(&to, &from) {
            return Err(FsError::illegal_path(
                &to,
                format!(
                    "Cannot rename '{}' to '{}' because the target is inside the source",
                    from, to
                ),
            ));
        }
        if path::is_within(&from, &to) {
            return Err(FsError::illegal_path(
                &to,
                format!(
                    "Cannot rename '{}' to '{}' because the target contains the source",
                    from, to
                ),
            ));
        }

        if let Some(target) = self.ctx.get_file(&to)? {
            if !overwrite {
                return Err(FsError::already_exists(
                    &to,
                    format!(
                        "Cannot rename '{}' to '{}' because the target already exists. \
                         Set the 'overwrite' option to 'true' to replace it",
                        from, to
                    ),
                ));
            }
            self.ctx.locks().verify_tree_not_locked("rename", &to)?;
            delete_entry(&mut self.ctx, &target)?;
        }

        tracing::trace!(from = %from, to = %to, "rename");
        self.ctx.session().rename(&from, &to).map_err(|e| {
            FsError::classify(
                "rename",
                &from,
                format!("Could not rename '{}' to '{}'", from, to),
                e,
            )
        })?;
        tracing::debug!(from = %from, to = %to, "renamed path");
        Ok(())
    }
}
