// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};

/// One message in the conversation sent to a provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Msg {
    pub role: Role,
    pub parts: Vec<MsgPart>,
}

impl Msg {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: Role::System, parts: vec![MsgPart::Text { text: text.into() }] }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, parts: vec![MsgPart::Text { text: text.into() }] }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, parts: vec![MsgPart::Text { text: text.into() }] }
    }

    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            parts: vec![MsgPart::ToolCall { id: id.into(), name: name.into(), args: args.into() }],
        }
    }

    pub fn tool_result(id: impl Into<String>, out: impl Into<String>, is_err: bool) -> Self {
        Self {
            role: Role::Tool,
            parts: vec![MsgPart::ToolResult { id: id.into(), out: out.into(), is_err }],
        }
    }

    /// Plain text of this message, if it is a single text part.
    pub fn as_text(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [MsgPart::Text { text }] => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MsgPart {
    Text { text: String },
    ToolCall { id: String, name: String, args: String },
    ToolResult { id: String, out: String, is_err: bool },
}

/// `{name, desc, schema}` as advertised to the provider (spec §4.3 request
/// shape). Mirrors `pz_tools::ToolSpec`; kept as a separate type so this
/// crate doesn't depend on `pz-tools`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub desc: String,
    pub schema: serde_json::Value,
}

/// Per-turn provider options (sampling, thinking level, etc). Kept as a
/// free-form JSON object so new knobs don't require a schema change here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReqOpts(pub serde_json::Value);

/// One model-turn request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Req {
    pub model: String,
    pub provider_label: String,
    pub msgs: Vec<Msg>,
    pub tools: Vec<ToolSpec>,
    pub opts: ReqOpts,
}
