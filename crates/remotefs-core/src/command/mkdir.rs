// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use crate::command::CommandContext;
use crate::error::FsResult;
use crate::session::RemoteSession;

pub struct MkdirCommand<'a, S: RemoteSession + ?Sized> {
    ctx: CommandContext<'a, S>,
}

impl<'a, S: RemoteSession + ?Sized> MkdirCommand<'a, S> {
    pub fn new(ctx: CommandContext<'a, S>) -> Self {
        Self { ctx }
    }

    /// Create the directory at `path`; an existing directory is not an error
    ///
    /// The parent must exist. Use a write with `create_parent_directories` or
    /// several calls to build a deeper tree.
    pub fn mkdir(&mut self, path: &str) -> FsResult<()> {
        let path = self.ctx.resolve_path(path)?;
        self.ctx.create_directory(&path)?;
        tracing::debug!(path = %path, "created directory");
        Ok(())
    }
}
