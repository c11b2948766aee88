use serde::{Deserialize, Serialize};

/// One append-only session log record: `{ at_ms, data }`.
///
/// `at_ms` is monotone non-decreasing across a single session but is **not**
/// guaranteed unique — two events written in the same millisecond both carry
/// the same timestamp. Ordering within a session is defined by write order,
/// not by `at_ms`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub at_ms: i64,
    pub data: EventBody,
}

impl Event {
    pub fn new(at_ms: i64, data: EventBody) -> Self {
        Self { at_ms, data }
    }
}

/// Per-turn token accounting.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageTotals {
    pub in_tok: u64,
    pub out_tok: u64,
    pub tot_tok: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_write: Option<u64>,
}

/// Why a turn stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Done,
    MaxOut,
    Tool,
    Canceled,
    Err,
}

/// The closed set of session log record bodies.
///
/// Readers must tolerate unknown fields within a known variant and must
/// skip lines whose variant tag is unrecognised (forward-compatible
/// append-only log, per spec §3/§6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum EventBody {
    Prompt {
        text: String,
    },
    Text {
        text: String,
    },
    Thinking {
        text: String,
    },
    ToolCall {
        id: String,
        name: String,
        /// Opaque JSON-encoded argument object; the store never parses it.
        args: String,
    },
    ToolResult {
        id: String,
        out: String,
        is_err: bool,
    },
    Usage(UsageTotals),
    Stop {
        reason: StopReason,
    },
    Err {
        text: String,
    },
    /// Optional session metadata record, e.g. a rename.
    SessionMeta {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rename: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_round_trips_through_json() {
        let ev = Event::new(1700000000000, EventBody::Prompt { text: "ping".into() });
        let line = serde_json::to_string(&ev).unwrap();
        let back: Event = serde_json::from_str(&line).unwrap();
        assert_eq!(ev, back);
    }

    #[test]
    fn wire_shape_matches_spec_example() {
        let line = r#"{"at_ms":1700000000006,"data":{"tool_call":{"id":"c1","name":"bash","args":"{\"cmd\":\"ls\"}"}}}"#;
        let ev: Event = serde_json::from_str(line).unwrap();
        match ev.data {
            EventBody::ToolCall { id, name, args } => {
                assert_eq!(id, "c1");
                assert_eq!(name, "bash");
                assert_eq!(args, r#"{"cmd":"ls"}"#);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn unknown_fields_inside_a_known_variant_are_tolerated() {
        let line = r#"{"at_ms":1,"data":{"text":{"text":"hi","extra_future_field":true}}}"#;
        let ev: Event = serde_json::from_str(line).unwrap();
        assert_eq!(ev.data, EventBody::Text { text: "hi".into() });
    }

    #[test]
    fn stop_reason_serializes_snake_case() {
        let ev = Event::new(0, EventBody::Stop { reason: StopReason::MaxOut });
        let line = serde_json::to_string(&ev).unwrap();
        assert!(line.contains("\"max_out\""));
    }
}
