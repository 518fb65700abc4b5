// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Filesystem configuration

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ENCODING: &str = "UTF-8";

fn default_encoding() -> String {
    DEFAULT_ENCODING.to_string()
}

/// Settings shared by every operation of one filesystem instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FsConfig {
    /// Directory every leased session is moved to before use
    /// Relative operation paths resolve against it
    #[serde(default)]
    pub working_dir: Option<String>,

    /// Charset reported for textual media types and used for writes that
    /// don't name an encoding
    #[serde(default = "default_encoding")]
    pub default_encoding: String,

    /// Media type reported when the file extension is not recognised
    #[serde(default)]
    pub default_media_type: Option<String>,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            working_dir: None,
            default_encoding: default_encoding(),
            default_media_type: None,
        }
    }
}

impl FsConfig {
    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("parsing filesystem config")
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {:?}", path))?;
        Self::from_toml_str(&content).with_context(|| format!("invalid config file {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_to_empty_document() {
        let config = FsConfig::from_toml_str("").unwrap();
        assert_eq!(config, FsConfig::default());
        assert_eq!(config.default_encoding, "UTF-8");
    }

    #[test]
    fn parses_kebab_case_keys() {
        let config = FsConfig::from_toml_str(
            r#"
            working-dir = "/srv/data"
            default-encoding = "ISO-8859-1"
            default-media-type = "application/octet-stream"
            "#,
        )
        .unwrap();
        assert_eq!(config.working_dir.as_deref(), Some("/srv/data"));
        assert_eq!(config.default_encoding, "ISO-8859-1");
        assert_eq!(
            config.default_media_type.as_deref(),
            Some("application/octet-stream")
        );
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(FsConfig::from_toml_str("working-dir = 5").is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "working-dir = \"/upload\"").unwrap();
        let config = FsConfig::load(file.path()).unwrap();
        assert_eq!(config.working_dir.as_deref(), Some("/upload"));
    }
}
