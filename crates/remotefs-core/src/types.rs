// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Core type definitions for remotefs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::path;

/// Kind of entry a remote path points to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    RegularFile,
    Directory,
    SymbolicLink,
    /// Sockets, devices and anything else the server reports
    Other,
}

/// Immutable snapshot of a remote path's metadata
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttributes {
    name: String,
    path: String,
    size: u64,
    timestamp: DateTime<Utc>,
    file_type: FileType,
}

impl FileAttributes {
    /// Build attributes for a canonical path; the name is its last segment
    pub fn new(path: &str, size: u64, timestamp: DateTime<Utc>, file_type: FileType) -> Self {
        let path = path::normalize(path);
        Self {
            name: path::file_name(&path).to_string(),
            path,
            size,
            timestamp,
            file_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Last modification instant
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn is_directory(&self) -> bool {
        self.file_type == FileType::Directory
    }

    pub fn is_symbolic_link(&self) -> bool {
        self.file_type == FileType::SymbolicLink
    }

    pub fn is_regular_file(&self) -> bool {
        self.file_type == FileType::RegularFile
    }
}

/// Policy governing how a write treats an existing target
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteMode {
    /// Target must not exist
    CreateNew,
    /// Position at end of an existing target
    Append,
    /// Truncate an existing target
    #[default]
    Overwrite,
}

impl std::fmt::Display for WriteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteMode::CreateNew => write!(f, "CREATE_NEW"),
            WriteMode::Append => write!(f, "APPEND"),
            WriteMode::Overwrite => write!(f, "OVERWRITE"),
        }
    }
}

impl std::str::FromStr for WriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "CREATE_NEW" => Ok(WriteMode::CreateNew),
            "APPEND" => Ok(WriteMode::Append),
            "OVERWRITE" => Ok(WriteMode::Overwrite),
            _ => Err(format!(
                "Invalid write mode: {}. Use 'CREATE_NEW', 'APPEND' or 'OVERWRITE'",
                s
            )),
        }
    }
}
