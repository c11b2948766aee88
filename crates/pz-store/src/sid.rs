// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use pz_events::TimeSource;

use crate::error::{invalid_path, StoreError};

/// Derive a fresh session id from the current time, microsecond resolution
/// (spec §4.1 `auto`: "fresh SID derived from a microsecond timestamp").
pub fn fresh_sid(clock: &dyn TimeSource) -> String {
    format!("{:016x}", clock.now_us())
}

/// A session id may only contain characters that are safe as a bare file
/// stem on every platform we care about; in particular no path separators
/// and no `..`, so a hostile id can never escape the session directory.
pub fn validate(sid: &str) -> Result<(), StoreError> {
    if sid.is_empty() {
        return Err(StoreError::InvalidPath("empty session id".into()));
    }
    let ok = sid
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !ok || sid == "." || sid == ".." {
        return Err(StoreError::InvalidPath(format!("bad session id: {sid:?}")));
    }
    Ok(())
}

pub fn log_path(dir: &Path, sid: &str) -> PathBuf {
    dir.join(format!("{sid}.jsonl"))
}

pub fn tmp_path(dir: &Path, sid: &str) -> PathBuf {
    dir.join(format!("{sid}.jsonl.tmp"))
}

/// Parse an explicit `<dir>/<sid>.jsonl` path selector (spec §4.1
/// `explicit(path)`), returning the directory and bare sid.
pub fn parse_log_path(path: &Path) -> Result<(PathBuf, String), StoreError> {
    let dir = path
        .parent()
        .map(|p| p.to_path_buf())
        .ok_or_else(|| invalid_path(path))?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| invalid_path(path))?;
    let ext_ok = path.extension().and_then(|e| e.to_str()) == Some("jsonl");
    if !ext_ok {
        return Err(invalid_path(path));
    }
    validate(stem)?;
    Ok((dir, stem.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_traversal() {
        assert!(validate("../evil").is_err());
        assert!(validate("a/b").is_err());
        assert!(validate("").is_err());
    }

    #[test]
    fn validate_accepts_plain_ids() {
        assert!(validate("0123abc-def_9").is_ok());
    }

    #[test]
    fn parse_log_path_splits_dir_and_sid() {
        let (dir, sid) = parse_log_path(Path::new("/tmp/sessions/abc123.jsonl")).unwrap();
        assert_eq!(dir, Path::new("/tmp/sessions"));
        assert_eq!(sid, "abc123");
    }

    #[test]
    fn parse_log_path_rejects_wrong_extension() {
        assert!(parse_log_path(Path::new("/tmp/sessions/abc123.json")).is_err());
    }
}
