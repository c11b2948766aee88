// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! In-memory conversation history (spec §3): an ordered sequence of
//! `(role, part)` pairs, rebuilt from the event log at session open and
//! mutated by the loop during execution. Expressed in terms of
//! [`pz_provider::Msg`] since that's exactly the shape a provider request
//! needs.

use pz_events::{Event, EventBody};
use pz_provider::Msg;

/// Fold one replayed or freshly-appended session [`Event`] into the
/// in-memory history, mirroring spec §3's "replay reproduces the in-memory
/// conversation history that would re-prompt the provider identically".
///
/// Events with no conversational shape (`usage`, `stop`, `err`,
/// `session-meta`) are dropped; they're accounting/control records, not
/// conversation turns.
pub fn fold_event(history: &mut Vec<Msg>, event: &Event) {
    match &event.data {
        EventBody::Prompt { text } => history.push(Msg::user(text.clone())),
        EventBody::Text { text } => history.push(Msg::assistant(text.clone())),
        EventBody::Thinking { .. } => {}
        EventBody::ToolCall { id, name, args } => {
            history.push(Msg::tool_call(id.clone(), name.clone(), args.clone()))
        }
        EventBody::ToolResult { id, out, is_err } => {
            history.push(Msg::tool_result(id.clone(), out.clone(), *is_err))
        }
        EventBody::Usage(_) | EventBody::Stop { .. } | EventBody::Err { .. } | EventBody::SessionMeta { .. } => {}
    }
}
