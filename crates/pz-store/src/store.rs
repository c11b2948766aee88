// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use pz_events::{Event, EventBody};

use crate::error::StoreError;
use crate::replay::ReplayReader;
use crate::sid;

/// Result of a [`SessionStore::stats`] call: path, size, event-line count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub event_count: u64,
}

/// Result of a [`SessionStore::compact`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactStats {
    pub in_lines: u64,
    pub out_lines: u64,
    pub in_bytes: u64,
    pub out_bytes: u64,
}

/// Roughly 4 characters per token, matching the heuristic the rest of this
/// workspace uses for token budgeting.
fn approx_tokens(serialized: &str) -> usize {
    serialized.len() / 4
}

/// A per-directory collection of append-only JSONL session logs (spec
/// §4.1). Every operation is keyed by a bare session id; the store never
/// exposes or accepts raw filesystem paths except through `fork`'s explicit
/// `<dir>/<sid>.jsonl` parsing helper in [`crate::sid`].
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Open a store rooted at `dir`, creating the directory if absent.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, sid: &str) -> Result<PathBuf, StoreError> {
        sid::validate(sid)?;
        Ok(sid::log_path(&self.dir, sid))
    }

    /// Serialize `event` as one line of canonical JSON, write, flush, fsync.
    ///
    /// A crash between the write and the fsync can only ever leave a
    /// trailing partial line on disk, which [`Self::replay`] skips — the
    /// store never needs to repair the file itself.
    pub fn append(&self, sid: &str, event: &Event) -> Result<(), StoreError> {
        let path = self.path(sid)?;
        let mut line = serde_json::to_string(event)
            .map_err(|e| StoreError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        line.push('\n');
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }

    /// Lazy, finite, non-restartable sequence of events in append order.
    pub fn replay(&self, sid: &str) -> Result<ReplayReader, StoreError> {
        let path = self.path(sid)?;
        if !path.exists() {
            return Err(StoreError::NotFound(sid.to_string()));
        }
        ReplayReader::open(&path)
    }

    /// Path, size in bytes, event-line count. Single pass.
    pub fn stats(&self, sid: &str) -> Result<SessionStats, StoreError> {
        let path = self.path(sid)?;
        let meta = fs::metadata(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(sid.to_string())
            } else {
                StoreError::Io(e)
            }
        })?;
        let event_count = self.replay(sid)?.count() as u64;
        Ok(SessionStats {
            path,
            size_bytes: meta.len(),
            event_count,
        })
    }

    /// Keep the most recent `keep_tokens` worth of events, replacing
    /// everything older with a single summarised `text` event. Atomic:
    /// writes to `<sid>.jsonl.tmp`, fsyncs, renames over the original.
    pub fn compact(&self, sid: &str, now_ms: i64, keep_tokens: usize) -> Result<CompactStats, StoreError> {
        let path = self.path(sid)?;
        let in_bytes = fs::metadata(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(sid.to_string())
            } else {
                StoreError::Io(e)
            }
        })?
        .len();

        let all: Vec<Event> = self.replay(sid)?.collect();
        let in_lines = all.len() as u64;

        let mut kept_rev: Vec<Event> = Vec::new();
        let mut budget = keep_tokens;
        let mut split = all.len();
        for (idx, ev) in all.iter().enumerate().rev() {
            let serialized = serde_json::to_string(ev).unwrap_or_default();
            let cost = approx_tokens(&serialized);
            if budget == 0 && idx != all.len() - 1 {
                split = idx + 1;
                break;
            }
            budget = budget.saturating_sub(cost);
            kept_rev.push(ev.clone());
            split = idx;
        }
        kept_rev.reverse();
        let dropped = split;

        let tmp = sid::tmp_path(&self.dir, sid);
        let mut out = File::create(&tmp)?;
        let mut out_lines = 0u64;

        if dropped > 0 {
            let summary = Event::new(
                now_ms,
                EventBody::Text {
                    text: format!("[compacted: {dropped} earlier event(s) summarised to free context]"),
                },
            );
            let mut line = serde_json::to_string(&summary).unwrap();
            line.push('\n');
            out.write_all(line.as_bytes())?;
            out_lines += 1;
        }
        for ev in &kept_rev {
            let mut line = serde_json::to_string(ev).unwrap();
            line.push('\n');
            out.write_all(line.as_bytes())?;
            out_lines += 1;
        }
        out.flush()?;
        out.sync_all()?;
        drop(out);

        let out_bytes = fs::metadata(&tmp)?.len();
        fs::rename(&tmp, &path)?;

        Ok(CompactStats {
            in_lines,
            out_lines,
            in_bytes,
            out_bytes,
        })
    }

    /// Byte-copy the source log into a new session log.
    pub fn fork(&self, src_sid: &str, dst_sid: &str) -> Result<(), StoreError> {
        let src = self.path(src_sid)?;
        let dst = self.path(dst_sid)?;
        if !src.exists() {
            return Err(StoreError::NotFound(src_sid.to_string()));
        }
        if dst.exists() {
            return Err(StoreError::Exists(dst_sid.to_string()));
        }
        fs::copy(&src, &dst)?;
        Ok(())
    }

    /// Directory scan yielding session IDs sorted ascending by raw string
    /// order.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Session ids sorted by log mtime ascending, ties broken by sid
    /// (used by the `continue`/`resume` selector).
    pub(crate) fn list_by_mtime(&self) -> Result<Vec<String>, StoreError> {
        let mut entries: Vec<(std::time::SystemTime, String)> = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let mtime = entry.metadata()?.modified()?;
            entries.push((mtime, stem.to_string()));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        Ok(entries.into_iter().map(|(_, s)| s).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pz_events::StopReason;

    fn ev(at_ms: i64, text: &str) -> Event {
        Event::new(at_ms, EventBody::Text { text: text.into() })
    }

    #[test]
    fn append_then_replay_round_trips_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        store.append("s1", &ev(1, "a")).unwrap();
        store.append("s1", &ev(2, "b")).unwrap();
        store.append("s1", &Event::new(3, EventBody::Stop { reason: StopReason::Done })).unwrap();

        let got: Vec<Event> = store.replay("s1").unwrap().collect();
        assert_eq!(got.len(), 3);
        assert_eq!(got[0], ev(1, "a"));
        assert_eq!(got[2].data, EventBody::Stop { reason: StopReason::Done });
    }

    #[test]
    fn replay_skips_malformed_interior_line_and_stops_at_trailing_partial() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        store.append("s1", &ev(1, "a")).unwrap();
        let path = store.path("s1").unwrap();
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            writeln!(f, "{{not json}}").unwrap();
        }
        store.append("s1", &ev(2, "b")).unwrap();
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            write!(f, "{{\"at_ms\":3,\"data\":{{\"text\":{{\"text\":\"c\"").unwrap();
        }

        let mut reader = store.replay("s1").unwrap();
        let got: Vec<Event> = (&mut reader).collect();
        assert_eq!(got, vec![ev(1, "a"), ev(2, "b")]);
        assert_eq!(reader.take_warnings().len(), 1, "the malformed interior line produces exactly one warning");
    }

    #[test]
    fn replay_of_missing_session_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        let err = store.replay("nope").unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn stats_reports_size_and_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        store.append("s1", &ev(1, "a")).unwrap();
        store.append("s1", &ev(2, "b")).unwrap();
        let stats = store.stats("s1").unwrap();
        assert_eq!(stats.event_count, 2);
        assert!(stats.size_bytes > 0);
    }

    #[test]
    fn compact_keeps_tail_and_summarises_head() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        for i in 0..20 {
            store.append("s1", &ev(i, &"x".repeat(100))).unwrap();
        }
        let before = store.stats("s1").unwrap();
        let result = store.compact("s1", 9999, 50).unwrap();
        assert_eq!(result.in_lines, 20);
        assert!(result.out_lines < result.in_lines);
        let after = store.stats("s1").unwrap();
        assert!(after.size_bytes < before.size_bytes);

        let events: Vec<Event> = store.replay("s1").unwrap().collect();
        assert!(matches!(events[0].data, EventBody::Text { .. }));
        assert!(events.last().unwrap().at_ms == 19);
    }

    #[test]
    fn compact_is_noop_shaped_when_everything_fits() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        store.append("s1", &ev(1, "tiny")).unwrap();
        let result = store.compact("s1", 0, 1_000_000).unwrap();
        assert_eq!(result.out_lines, result.in_lines);
    }

    #[test]
    fn fork_copies_log_and_rejects_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        store.append("s1", &ev(1, "a")).unwrap();
        store.fork("s1", "s2").unwrap();
        let got: Vec<Event> = store.replay("s2").unwrap().collect();
        assert_eq!(got, vec![ev(1, "a")]);

        let err = store.fork("s1", "s2").unwrap_err();
        assert_eq!(err.kind(), "exists");
    }

    #[test]
    fn fork_of_missing_source_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        let err = store.fork("nope", "dst").unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn list_is_sorted_ascending_by_raw_string() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        store.append("b2", &ev(1, "x")).unwrap();
        store.append("a1", &ev(1, "x")).unwrap();
        store.append("c3", &ev(1, "x")).unwrap();
        assert_eq!(store.list().unwrap(), vec!["a1", "b2", "c3"]);
    }

    #[test]
    fn append_rejects_path_traversal_sids() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        let err = store.append("../escape", &ev(1, "x")).unwrap_err();
        assert_eq!(err.kind(), "invalid_path");
    }
}
