// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Media type resolution for read results

use crate::config::FsConfig;
use crate::types::FileAttributes;

const BY_EXTENSION: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("log", "text/plain"),
    ("csv", "text/csv"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("css", "text/css"),
    ("md", "text/markdown"),
    ("xml", "application/xml"),
    ("json", "application/json"),
    ("js", "application/javascript"),
    ("yaml", "application/yaml"),
    ("yml", "application/yaml"),
    ("toml", "application/toml"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("tar", "application/x-tar"),
    ("bin", "application/octet-stream"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
];

fn is_textual(media_type: &str) -> bool {
    media_type.starts_with("text/")
        || matches!(
            media_type,
            "application/xml"
                | "application/json"
                | "application/javascript"
                | "application/yaml"
                | "application/toml"
                | "image/svg+xml"
        )
}

/// Best-effort media type for a file, `None` when it can't be determined
///
/// Textual types carry the configured default charset.
pub fn resolve_media_type(attributes: &FileAttributes, config: &FsConfig) -> Option<String> {
    if attributes.is_directory() {
        return None;
    }

    let name = attributes.name();
    let known = name
        .rsplit_once('.')
        .filter(|(stem, _)| !stem.is_empty())
        .and_then(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            BY_EXTENSION.iter().find(|(candidate, _)| *candidate == ext).map(|(_, mt)| *mt)
        });

    match known {
        Some(media_type) if is_textual(media_type) => {
            Some(format!("{}; charset={}", media_type, config.default_encoding))
        }
        Some(media_type) => Some(media_type.to_string()),
        None => config.default_media_type.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileType;
    use chrono::Utc;

    fn file(path: &str) -> FileAttributes {
        FileAttributes::new(path, 1, Utc::now(), FileType::RegularFile)
    }

    #[test]
    fn text_types_carry_charset() {
        let config = FsConfig::default();
        assert_eq!(
            resolve_media_type(&file("/a/notes.TXT"), &config).as_deref(),
            Some("text/plain; charset=UTF-8")
        );
    }

    #[test]
    fn binary_types_have_no_charset() {
        let config = FsConfig::default();
        assert_eq!(
            resolve_media_type(&file("/img.png"), &config).as_deref(),
            Some("image/png")
        );
    }

    #[test]
    fn unknown_extension_uses_configured_default() {
        let mut config = FsConfig::default();
        assert_eq!(resolve_media_type(&file("/data.xyz"), &config), None);
        assert_eq!(resolve_media_type(&file("/.hidden"), &config), None);
        config.default_media_type = Some("application/octet-stream".into());
        assert_eq!(
            resolve_media_type(&file("/noext"), &config).as_deref(),
            Some("application/octet-stream")
        );
    }
}
