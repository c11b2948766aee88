// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use pz_events::{FailKind, ModeEvent, ToolEventEnvelope, ToolFinal, ToolKind, ToolResult, MASK_ALL};
use tracing::{debug, warn};

use crate::tool::{HandlerCtx, ToolCall, ToolHandler};

/// `{name, desc, schema}` as advertised to the provider (spec §4.3 request
/// shape `tools:[{name,desc,schema}]`).
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub desc: String,
    pub schema: serde_json::Value,
}

struct Entry {
    kind: ToolKind,
    handler: Arc<dyn ToolHandler>,
}

/// Ordered list of `{name, kind, spec, dispatch}` entries, gated by an
/// 8-bit kind mask (spec §4.2). Lookup is always by name.
pub struct ToolRegistry {
    entries: Vec<(String, Entry)>,
    mask: u8,
}

impl ToolRegistry {
    pub fn new(mask: u8) -> Self {
        Self {
            entries: Vec::new(),
            mask,
        }
    }

    /// A registry with every built-in tool registered and every kind
    /// enabled.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new(MASK_ALL);
        reg.register(crate::builtin::read::ReadHandler);
        reg.register(crate::builtin::write::WriteHandler);
        reg.register(crate::builtin::bash::BashHandler::default());
        reg.register(crate::builtin::edit::EditHandler);
        reg.register(crate::builtin::grep::GrepHandler);
        reg.register(crate::builtin::find::FindHandler);
        reg.register(crate::builtin::ls::LsHandler);
        reg.register(crate::builtin::ask::AskHandler);
        reg
    }

    pub fn register(&mut self, handler: impl ToolHandler + 'static) {
        let name = handler.name().to_string();
        self.entries.push((
            name,
            Entry {
                kind: handler.kind(),
                handler: Arc::new(handler),
            },
        ));
    }

    pub fn mask(&self) -> u8 {
        self.mask
    }

    /// Rebuild the registry's view for a new mask. The entry list itself
    /// never changes; only which entries are exposed to callers does.
    pub fn set_mask(&mut self, mask: u8) {
        self.mask = mask;
    }

    fn visible(&self) -> impl Iterator<Item = &(String, Entry)> {
        self.entries.iter().filter(move |(_, e)| self.mask & e.kind.mask() != 0)
    }

    /// Tool specs for every kind currently enabled by the mask, in
    /// registration order.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.visible()
            .map(|(name, e)| ToolSpec {
                name: name.clone(),
                desc: e.handler.description().to_string(),
                schema: e.handler.schema(),
            })
            .collect()
    }

    /// `run(name, call, sink)`: push `start`, invoke the handler (or
    /// synthesize a `tool-not-found` failure when the name is unknown or
    /// masked out), push each output chunk, push `finish`.
    ///
    /// A handler-level `Err` propagates without `finish` being emitted —
    /// the caller must synthesize its own failure event for that case.
    pub async fn run(
        &self,
        call: &ToolCall,
        ctx: &HandlerCtx<'_>,
        mut sink: impl FnMut(ModeEvent),
    ) -> anyhow::Result<ToolResult> {
        let started_at_ms = ctx.clock.now_ms();
        debug!(tool = %call.name, call_id = %call.call_id, "tool dispatch start");
        sink(ModeEvent::Tool(ToolEventEnvelope::Start {
            call_id: call.call_id.clone(),
            name: call.name.clone(),
            args: call.args.clone(),
            at_ms: started_at_ms,
        }));

        let found = self
            .entries
            .iter()
            .find(|(name, _)| name == &call.name)
            .filter(|(_, e)| self.mask & e.kind.mask() != 0);

        let output = match found {
            Some((_, entry)) => entry.handler.run(call, ctx).await?,
            None => {
                warn!(tool = %call.name, "tool dispatch: name unknown or masked out");
                crate::tool::HandlerOutput::failed(
                    FailKind::NotFound,
                    format!("tool-not-found:{}", call.name),
                )
            }
        };

        for chunk in &output.chunks {
            sink(ModeEvent::Tool(ToolEventEnvelope::Output(chunk.clone())));
        }

        if output.outcome.is_error() {
            warn!(tool = %call.name, call_id = %call.call_id, "tool dispatch finished with an error outcome");
        }

        let result = ToolResult {
            call_id: call.call_id.clone(),
            started_at_ms,
            ended_at_ms: ctx.clock.now_ms(),
            out: output.chunks,
            outcome: output.outcome,
        };
        debug!(tool = %call.name, call_id = %call.call_id, "tool dispatch finish");
        sink(ModeEvent::Tool(ToolEventEnvelope::Finish {
            call_id: call.call_id.clone(),
            result: result.clone(),
        }));
        Ok(result)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Whether `outcome` represents an error, for folding into the session
/// `tool_result.is_err` field.
pub fn is_err(outcome: &ToolFinal) -> bool {
    outcome.is_error()
}
