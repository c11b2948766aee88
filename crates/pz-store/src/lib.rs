// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Per-directory collection of append-only JSONL session logs.
//!
//! Every write goes through [`SessionStore::append`] and is flushed and
//! fsynced before the call returns; every read goes through
//! [`SessionStore::replay`], a lazy line-at-a-time iterator that tolerates
//! a crash-truncated trailing line and skips malformed interior ones.

mod error;
mod replay;
mod selector;
mod sid;
mod store;

pub use error::StoreError;
pub use replay::ReplayReader;
pub use selector::resolve;
pub use sid::{fresh_sid, log_path, parse_log_path, validate as validate_sid};
pub use store::{CompactStats, SessionStats, SessionStore};
