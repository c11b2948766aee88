// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `ModeSink` implementations (spec §4.5): Print, JSON lines, and a bare
//! in-memory recorder used by tests and as the RPC transcript buffer. The
//! Interactive/TUI sink lives in `pz-tui`, which implements this same
//! trait.

use std::io::Write;

use pz_events::{ModeEvent, ProviderEvent, StopReason, ToolEventEnvelope};
use serde_json::{json, Value};

/// Everything a mode can observe during a run, per [`ModeEvent`]. Mode
/// crates implement this to decide what to render.
pub trait ModeSink: Send {
    fn push(&mut self, event: ModeEvent);
}

/// Encode a [`ProviderEvent`] as JSON. `ProviderEvent` itself carries no
/// serde impls (it's pure in-process plumbing per `pz-events`), so JSON
/// sinks go through this explicit mapping instead.
pub fn provider_event_to_json(ev: &ProviderEvent) -> Value {
    match ev {
        ProviderEvent::Text(text) => json!({"type": "text", "text": text}),
        ProviderEvent::Thinking(text) => json!({"type": "thinking", "text": text}),
        ProviderEvent::ToolCall { id, name, args } => {
            json!({"type": "tool_call", "id": id, "name": name, "args": args})
        }
        ProviderEvent::ToolResult { id, out, is_err } => {
            json!({"type": "tool_result", "id": id, "out": out, "is_err": is_err})
        }
        ProviderEvent::Usage(usage) => json!({"type": "usage", "usage": usage}),
        ProviderEvent::Stop(reason) => json!({"type": "stop", "reason": reason}),
        ProviderEvent::Err(msg) => json!({"type": "err", "msg": msg}),
    }
}

fn tool_envelope_to_json(ev: &ToolEventEnvelope) -> Value {
    match ev {
        ToolEventEnvelope::Start { call_id, name, args, at_ms } => {
            json!({"type": "start", "call_id": call_id, "name": name, "args": args, "at_ms": at_ms})
        }
        ToolEventEnvelope::Output(chunk) => json!({"type": "output", "chunk": chunk}),
        ToolEventEnvelope::Finish { call_id, result } => {
            json!({"type": "finish", "call_id": call_id, "result": result})
        }
    }
}

/// `{type: "replay"|"session"|"provider"|"tool", event: ...}` as spec §4.5
/// requires for the JSON-lines mode.
pub fn mode_event_to_json(ev: &ModeEvent) -> Value {
    match ev {
        ModeEvent::Replay(e) => json!({"type": "replay", "event": e}),
        ModeEvent::Session(e) => json!({"type": "session", "event": e}),
        ModeEvent::Provider(e) => json!({"type": "provider", "event": provider_event_to_json(e)}),
        ModeEvent::Tool(e) => json!({"type": "tool", "event": tool_envelope_to_json(e)}),
        ModeEvent::Warning(msg) => json!({"type": "warning", "msg": msg}),
    }
}

/// Formats each provider text chunk to a writer; suppresses replay/session
/// noise. Verbose mode adds usage, stop-reason, and tool-call summaries.
pub struct PrintSink<W: Write> {
    writer: W,
    verbose: bool,
    /// Exit code derived from the last stop reason seen, for the CLI to
    /// read after the run completes (spec §4.5: "map the stop reason to an
    /// exit code if applicable").
    pub last_stop: Option<StopReason>,
}

impl<W: Write> PrintSink<W> {
    pub fn new(writer: W, verbose: bool) -> Self {
        Self { writer, verbose, last_stop: None }
    }
}

impl<W: Write + Send> ModeSink for PrintSink<W> {
    fn push(&mut self, event: ModeEvent) {
        match event {
            ModeEvent::Provider(ProviderEvent::Text(text)) => {
                let _ = write!(self.writer, "{text}");
            }
            ModeEvent::Provider(ProviderEvent::Usage(usage)) if self.verbose => {
                let _ = writeln!(
                    self.writer,
                    "\n[usage] in={} out={} total={}",
                    usage.in_tok, usage.out_tok, usage.tot_tok
                );
            }
            ModeEvent::Provider(ProviderEvent::Stop(reason)) => {
                self.last_stop = Some(reason);
                if self.verbose {
                    let _ = writeln!(self.writer, "\n[stop] {reason:?}");
                }
            }
            ModeEvent::Provider(ProviderEvent::Err(msg)) => {
                let _ = writeln!(self.writer, "\n[error] {msg}");
            }
            ModeEvent::Tool(ToolEventEnvelope::Start { name, .. }) if self.verbose => {
                let _ = writeln!(self.writer, "\n[tool] {name} ...");
            }
            ModeEvent::Tool(ToolEventEnvelope::Finish { result, .. }) if self.verbose => {
                let _ = writeln!(self.writer, "[tool] done: {:?}", result.outcome);
            }
            ModeEvent::Warning(msg) => {
                let _ = writeln!(self.writer, "\n[warning] {msg}");
            }
            _ => {}
        }
        let _ = self.writer.flush();
    }
}

/// Emits one JSON object per [`ModeEvent`], newline-terminated.
pub struct JsonlSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonlSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write + Send> ModeSink for JsonlSink<W> {
    fn push(&mut self, event: ModeEvent) {
        let value = mode_event_to_json(&event);
        if let Ok(mut line) = serde_json::to_string(&value) {
            line.push('\n');
            let _ = self.writer.write_all(line.as_bytes());
            let _ = self.writer.flush();
        }
    }
}

/// Records every event it receives, for tests and for the RPC mode's
/// per-command transcript.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<ModeEvent>,
}

impl ModeSink for RecordingSink {
    fn push(&mut self, event: ModeEvent) {
        self.events.push(event);
    }
}
