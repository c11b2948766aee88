// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;

use pz_events::{OutputChunk, TimeSource, ToolFinal, ToolKind};

/// One incoming tool invocation, as decoded from a provider `tool_call`
/// event. `args` is the raw JSON-encoded argument object; handlers parse it
/// themselves so the registry never needs to know each tool's argument
/// shape.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub call_id: String,
    pub name: String,
    pub args: String,
}

/// Hook the TUI mode supplies for the `ask` tool (spec §4.2: "requires a
/// hook supplied by the sink"). Absent in every other mode.
pub trait AskHook: Send + Sync {
    fn ask(&self, question: &str) -> String;
}

/// Everything a handler needs besides its own arguments: the
/// dependency-injected clock (for deterministic timestamps) and the
/// optional interactive hook.
pub struct HandlerCtx<'a> {
    pub clock: &'a dyn TimeSource,
    pub ask_hook: Option<&'a dyn AskHook>,
}

/// What a handler hands back to the registry: its own output chunks
/// (already `seq`-ordered and bounded) plus the terminal outcome.
pub struct HandlerOutput {
    pub chunks: Vec<OutputChunk>,
    pub outcome: ToolFinal,
}

impl HandlerOutput {
    pub fn ok(code: i32, chunks: Vec<OutputChunk>) -> Self {
        Self {
            chunks,
            outcome: ToolFinal::Ok { code },
        }
    }

    pub fn failed(kind: pz_events::FailKind, msg: impl Into<String>) -> Self {
        Self {
            chunks: Vec::new(),
            outcome: ToolFinal::Failed {
                code: None,
                kind,
                msg: msg.into(),
            },
        }
    }
}

/// One built-in tool kind's implementation. The registry dispatches to
/// this; it never runs on its own.
///
/// Handlers only ever return `Err` for conditions outside the tool
/// failure envelope — an internal bug, not a user-facing `invalid_args`/
/// `not_found`/etc, which should be encoded as `HandlerOutput::failed`
/// instead so the dispatch envelope still completes with `finish`.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn kind(&self) -> ToolKind;
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn schema(&self) -> serde_json::Value;
    async fn run(&self, call: &ToolCall, ctx: &HandlerCtx<'_>) -> anyhow::Result<HandlerOutput>;
}
