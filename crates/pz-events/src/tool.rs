use serde::{Deserialize, Serialize};

/// The closed set of tool kinds. Each bit of an 8-bit mask gates exactly one
/// kind (spec §4.2); the discriminant doubles as the mask bit position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Read,
    Write,
    Bash,
    Edit,
    Grep,
    Find,
    Ls,
    Ask,
}

pub const ALL_KINDS: [ToolKind; 8] = [
    ToolKind::Read,
    ToolKind::Write,
    ToolKind::Bash,
    ToolKind::Edit,
    ToolKind::Grep,
    ToolKind::Find,
    ToolKind::Ls,
    ToolKind::Ask,
];

impl ToolKind {
    /// Bit position of this kind within an 8-bit tool mask.
    pub const fn bit(self) -> u8 {
        match self {
            ToolKind::Read => 0,
            ToolKind::Write => 1,
            ToolKind::Bash => 2,
            ToolKind::Edit => 3,
            ToolKind::Grep => 4,
            ToolKind::Find => 5,
            ToolKind::Ls => 6,
            ToolKind::Ask => 7,
        }
    }

    pub const fn mask(self) -> u8 {
        1 << self.bit()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ToolKind::Read => "read",
            ToolKind::Write => "write",
            ToolKind::Bash => "bash",
            ToolKind::Edit => "edit",
            ToolKind::Grep => "grep",
            ToolKind::Find => "find",
            ToolKind::Ls => "ls",
            ToolKind::Ask => "ask",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        ALL_KINDS.into_iter().find(|k| k.as_str() == s)
    }
}

/// A tool mask that is all kinds enabled.
pub const MASK_ALL: u8 = 0b1111_1111;
/// A tool mask with no kinds enabled.
pub const MASK_NONE: u8 = 0;

/// The stream a tool output chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStream {
    Stdout,
    Stderr,
    Meta,
}

/// One chunk of tool output, ordered by strictly increasing `seq` within a
/// single call (spec §3, invariant 4 of §8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputChunk {
    pub call_id: String,
    pub seq: u64,
    pub at_ms: i64,
    pub stream: OutputStream,
    /// Raw bytes of this chunk. `meta` chunks carry a JSON-encoded
    /// [`TruncationMeta`] as their (UTF-8) payload.
    pub chunk: Vec<u8>,
    /// Whether this chunk's buffer was moved (not copied) out of the
    /// producing handler into the registry. Informational only — Rust's
    /// ownership system already enforces single ownership of `chunk`.
    pub owned: bool,
    pub truncated: bool,
}

impl OutputChunk {
    pub fn text(call_id: impl Into<String>, seq: u64, at_ms: i64, stream: OutputStream, text: impl Into<String>, truncated: bool) -> Self {
        Self {
            call_id: call_id.into(),
            seq,
            at_ms,
            stream,
            chunk: text.into().into_bytes(),
            owned: true,
            truncated,
        }
    }

    pub fn meta(call_id: impl Into<String>, seq: u64, at_ms: i64, meta: &TruncationMeta) -> Self {
        let text = serde_json::to_string(meta).expect("TruncationMeta always serializes");
        Self::text(call_id, seq, at_ms, OutputStream::Meta, text, false)
    }
}

/// JSON payload of a `meta` truncation chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TruncationMeta {
    #[serde(rename = "type")]
    pub kind: String,
    pub stream: OutputStream,
    pub limit_bytes: usize,
    pub full_bytes: usize,
    pub kept_bytes: usize,
    pub dropped_bytes: usize,
}

impl TruncationMeta {
    pub fn new(stream: OutputStream, limit_bytes: usize, full_bytes: usize, kept_bytes: usize) -> Self {
        Self {
            kind: "trunc".to_string(),
            stream,
            limit_bytes,
            full_bytes,
            kept_bytes,
            dropped_bytes: full_bytes.saturating_sub(kept_bytes),
        }
    }
}

/// Kind of tool-level failure (never fatal to the agent loop).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailKind {
    InvalidArgs,
    NotFound,
    Denied,
    Io,
    Exec,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    User,
    Shutdown,
    Superseded,
}

/// The terminal outcome of a tool call.
///
/// Named `ToolFinal`; its value is carried by the wire field `"final"`
/// (reserved for future use as a bare Rust identifier, hence the rename).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolFinal {
    Ok { code: i32 },
    Failed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<i32>,
        kind: FailKind,
        msg: String,
    },
    Cancelled { reason: CancelReason },
    TimedOut { limit_ms: u64 },
}

impl ToolFinal {
    pub fn is_error(&self) -> bool {
        !matches!(self, ToolFinal::Ok { .. })
    }
}

/// The full result of one tool dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub started_at_ms: i64,
    pub ended_at_ms: i64,
    pub out: Vec<OutputChunk>,
    #[serde(rename = "final")]
    pub outcome: ToolFinal,
}

impl ToolResult {
    /// Concatenate all stdout+stderr text chunks into a single string, the
    /// shape the agent loop folds into a session `tool_result` event.
    pub fn text(&self) -> String {
        let mut s = String::new();
        for c in &self.out {
            if c.stream == OutputStream::Meta {
                continue;
            }
            s.push_str(&String::from_utf8_lossy(&c.chunk));
        }
        s
    }
}
