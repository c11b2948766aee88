use crate::event::Event;
use crate::provider::ProviderEvent;
use crate::tool::{OutputChunk, ToolResult};

/// A single tool-dispatch lifecycle event, as pushed to a sink by the tool
/// runtime (spec §4.2 dispatch contract: `start → output* → finish`).
#[derive(Debug, Clone)]
pub enum ToolEventEnvelope {
    Start { call_id: String, name: String, args: String, at_ms: i64 },
    Output(OutputChunk),
    Finish { call_id: String, result: ToolResult },
}

/// Everything a [`ModeSink`](../pz_core/trait.ModeSink.html) can observe
/// during a run (spec §4.5).
#[derive(Debug, Clone)]
pub enum ModeEvent {
    /// An event read back from the session log during the replay phase.
    Replay(Event),
    /// An event freshly appended to the session log during this run.
    Session(Event),
    /// A raw event streamed from the provider transport.
    Provider(ProviderEvent),
    /// A tool dispatch lifecycle event.
    Tool(ToolEventEnvelope),
    /// A non-fatal diagnostic surfaced to the live sink only — never written
    /// back to the session log (spec §4.1: a corrupted trailing log line is
    /// skipped with a warning, not an error).
    Warning(String),
}
