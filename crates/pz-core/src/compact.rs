// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use pz_store::{CompactStats, SessionStore, StoreError};

/// Injected compaction policy (spec §4.4: "invoke the injected compactor
/// with `(sid, now_ms)`"). A trait rather than a bare closure so the loop's
/// signature stays readable and so tests can substitute a spy.
pub trait Compactor: Send + Sync {
    fn compact(&self, sid: &str, now_ms: i64) -> Result<CompactStats, StoreError>;
}

/// Wraps [`SessionStore::compact`] with a fixed token budget, matching the
/// teacher's `compact_session` default of keeping the most recent 20000
/// tokens' worth of events.
pub struct StoreCompactor {
    pub store: std::sync::Arc<SessionStore>,
    pub keep_tokens: usize,
}

impl StoreCompactor {
    pub fn new(store: std::sync::Arc<SessionStore>, keep_tokens: usize) -> Self {
        Self { store, keep_tokens }
    }
}

impl Compactor for StoreCompactor {
    fn compact(&self, sid: &str, now_ms: i64) -> Result<CompactStats, StoreError> {
        self.store.compact(sid, now_ms, self.keep_tokens)
    }
}
