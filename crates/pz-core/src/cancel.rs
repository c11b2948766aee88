// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A poll-only cancellation flag (spec §5/§9: "a simple blocking loop with
/// an atomic cancellation flag is sufficient" — no coroutine-style
/// suspension). Checked between turns and between provider events within a
/// turn; never observed mid-tool-dispatch.
#[derive(Debug, Clone, Default)]
pub struct CancelSource(Arc<AtomicBool>);

impl CancelSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
