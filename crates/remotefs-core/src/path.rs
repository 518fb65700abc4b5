// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Remote path resolution
//!
//! Remote paths are plain forward-slash strings. They are never handed to
//! `std::path`, whose separator and prefix rules depend on the host platform
//! rather than on the remote server.

/// Separator used by every remote path
pub const SEPARATOR: char = '/';

pub const ROOT: &str = "/";

pub fn is_absolute(raw: &str) -> bool {
    raw.starts_with(SEPARATOR) || raw.starts_with('\\')
}

/// Normalize a path into canonical absolute form
///
/// Backslashes become slashes, empty and `.` segments are dropped and `..`
/// pops the previous segment. `..` at the root stays at the root. Relative
/// input is treated as relative to `/`.
pub fn normalize(raw: &str) -> String {
    let unified = raw.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return ROOT.to_string();
    }

    let mut canonical = String::with_capacity(unified.len() + 1);
    for segment in segments {
        canonical.push(SEPARATOR);
        canonical.push_str(segment);
    }
    canonical
}

/// Resolve `raw` against the working directory `cwd` into a canonical path
pub fn resolve(cwd: &str, raw: &str) -> String {
    if is_absolute(raw) {
        normalize(raw)
    } else {
        normalize(&format!("{}/{}", cwd, raw))
    }
}

/// Parent of a canonical path, `None` for the root
pub fn parent(canonical: &str) -> Option<&str> {
    if canonical == ROOT || canonical.is_empty() {
        return None;
    }
    match canonical.rfind(SEPARATOR) {
        Some(0) => Some(ROOT),
        Some(idx) => Some(&canonical[..idx]),
        None => Some(ROOT),
    }
}

/// Last segment of a canonical path; the root is named `/`
pub fn file_name(canonical: &str) -> &str {
    if canonical == ROOT {
        return ROOT;
    }
    match canonical.rfind(SEPARATOR) {
        Some(idx) => &canonical[idx + 1..],
        None => canonical,
    }
}

/// Append a child name to a canonical directory path
pub fn join(dir: &str, name: &str) -> String {
    normalize(&format!("{}/{}", dir, name))
}

/// Every non-root prefix of a canonical path, top-down, the path itself last
///
/// `/a/b/c` yields `/a`, `/a/b`, `/a/b/c`.
pub fn lineage(canonical: &str) -> Vec<String> {
    let mut current = String::new();
    let mut out = Vec::new();
    for segment in canonical.split(SEPARATOR).filter(|s| !s.is_empty()) {
        current.push(SEPARATOR);
        current.push_str(segment);
        out.push(current.clone());
    }
    out
}

/// Whether canonical `path` lies strictly below canonical `ancestor`
pub fn is_within(path: &str, ancestor: &str) -> bool {
    if path == ancestor {
        return false;
    }
    if ancestor == ROOT {
        return path.starts_with(SEPARATOR);
    }
    path.strip_prefix(ancestor)
        .is_some_and(|rest| rest.starts_with(SEPARATOR))
}
