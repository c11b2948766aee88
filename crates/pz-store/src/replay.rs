// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use pz_events::Event;

use crate::error::StoreError;

/// Lazy, finite, non-restartable iterator over one session log (spec §4.1
/// `replay`). Line-at-a-time streaming: never reads the file to end up
/// front, so a window can be taken from an enormous log without paging in
/// all of it.
///
/// - A malformed interior line (ends in `\n` but fails to parse) is skipped;
///   iteration continues. The skip is recorded in [`ReplayReader::warnings`]
///   for the caller to surface to its live sink — it is never written back
///   to the log.
/// - A trailing line with no terminating `\n` is a partial write in
///   progress or left over from a crash; iteration stops and that line is
///   never emitted.
pub struct ReplayReader {
    lines: BufReader<File>,
    done: bool,
    warnings: Vec<String>,
}

impl ReplayReader {
    pub(crate) fn open(path: &Path) -> Result<Self, StoreError> {
        let file = File::open(path)?;
        Ok(Self {
            lines: BufReader::new(file),
            done: false,
            warnings: Vec::new(),
        })
    }

    /// Drains the warnings accumulated so far (one per skipped malformed
    /// line or io hiccup). Call after exhausting the iterator to pick up
    /// everything the replay pass observed.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }
}

impl Iterator for ReplayReader {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        loop {
            if self.done {
                return None;
            }
            let mut buf = String::new();
            let n = match self.lines.read_line(&mut buf) {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(error = %e, "session replay: io error, stopping");
                    self.warnings.push(format!("session replay: io error, stopping: {e}"));
                    self.done = true;
                    return None;
                }
            };
            if n == 0 {
                self.done = true;
                return None;
            }
            if !buf.ends_with('\n') {
                // trailing partial line: stop, emit nothing for it
                self.done = true;
                return None;
            }
            let trimmed = buf.trim_end_matches('\n');
            match serde_json::from_str::<Event>(trimmed) {
                Ok(ev) => return Some(ev),
                Err(e) => {
                    tracing::warn!(error = %e, line = %trimmed, "session replay: skipping malformed line");
                    self.warnings.push(format!("session replay: skipping malformed line: {e}"));
                    continue;
                }
            }
        }
    }
}
