use crate::event::{StopReason, UsageTotals};

/// One event in a provider streaming turn (spec §4.3). Stop reasons map 1:1
/// onto session [`StopReason`].
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    Text(String),
    Thinking(String),
    ToolCall { id: String, name: String, args: String },
    ToolResult { id: String, out: String, is_err: bool },
    Usage(UsageTotals),
    Stop(StopReason),
    Err(String),
}
