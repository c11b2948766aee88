// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;

use async_trait::async_trait;
use futures::StreamExt;
use pz_events::{ProviderEvent, StopReason, UsageTotals};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::retry::TransportError;
use crate::transport::{ProviderStream, Transport};
use crate::types::{Msg, MsgPart, Req, Role};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Default)]
pub struct AuthCreds {
    pub api_key: Option<String>,
    pub oauth_token: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct AuthFile {
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    oauth_token: Option<String>,
}

fn auth_file_path() -> Option<std::path::PathBuf> {
    dirs::home_dir().map(|h| h.join(".pi").join("agent").join("auth.json"))
}

/// Resolve credentials per spec §4.3: environment first, then
/// `~/.pi/agent/auth.json`.
pub fn load_auth() -> AuthCreds {
    let env_key = std::env::var("ANTHROPIC_API_KEY").ok();
    let env_token = std::env::var("ANTHROPIC_OAUTH_TOKEN").ok();
    if env_key.is_some() || env_token.is_some() {
        return AuthCreds { api_key: env_key, oauth_token: env_token };
    }
    let Some(path) = auth_file_path() else { return AuthCreds::default() };
    let Ok(text) = std::fs::read_to_string(path) else { return AuthCreds::default() };
    let parsed: AuthFile = serde_json::from_str(&text).unwrap_or_default();
    AuthCreds { api_key: parsed.api_key, oauth_token: parsed.oauth_token }
}

pub struct NativeTransport {
    client: reqwest::Client,
    base_url: String,
    auth: AuthCreds,
}

impl NativeTransport {
    pub fn new(auth: AuthCreds) -> Self {
        Self { client: reqwest::Client::new(), base_url: DEFAULT_BASE_URL.to_string(), auth }
    }

    /// `None` when neither an API key nor an OAuth token is configured — the
    /// caller falls back to the missing-provider stub.
    pub fn from_env() -> Option<Self> {
        let auth = load_auth();
        if auth.api_key.is_none() && auth.oauth_token.is_none() {
            return None;
        }
        Some(Self::new(auth))
    }

    fn build_body(req: &Req) -> (String, Value) {
        let mut system = String::new();
        let mut msgs = Vec::new();
        for m in &req.msgs {
            match m.role {
                Role::System => {
                    if let Some(t) = m.as_text() {
                        if !system.is_empty() {
                            system.push('\n');
                        }
                        system.push_str(t);
                    }
                }
                _ => msgs.push(to_anthropic_msg(m)),
            }
        }
        let tools: Vec<Value> = req
            .tools
            .iter()
            .map(|t| json!({"name": t.name, "description": t.desc, "input_schema": t.schema}))
            .collect();
        let body = json!({
            "model": req.model,
            "max_tokens": 4096,
            "system": system,
            "messages": msgs,
            "tools": tools,
            "stream": true,
        });
        (system, body)
    }
}

fn to_anthropic_msg(m: &Msg) -> Value {
    let role = match m.role {
        Role::User | Role::Tool => "user",
        _ => "assistant",
    };
    let content: Vec<Value> = m
        .parts
        .iter()
        .map(|p| match p {
            MsgPart::Text { text } => json!({"type": "text", "text": text}),
            MsgPart::ToolCall { id, name, args } => {
                json!({"type": "tool_use", "id": id, "name": name, "input": serde_json::from_str::<Value>(args).unwrap_or(Value::Null)})
            }
            MsgPart::ToolResult { id, out, is_err } => {
                json!({"type": "tool_result", "tool_use_id": id, "content": out, "is_error": is_err})
            }
        })
        .collect();
    json!({"role": role, "content": content})
}

#[async_trait]
impl Transport for NativeTransport {
    async fn start(&self, req: Req) -> Result<ProviderStream, TransportError> {
        let key = self
            .auth
            .api_key
            .clone()
            .or_else(|| self.auth.oauth_token.clone())
            .ok_or_else(|| TransportError::Fatal { msg: "no credentials configured".into() })?;

        let (_system, body) = Self::build_body(&req);
        let mut builder = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("anthropic-version", ANTHROPIC_VERSION);
        builder = match &self.auth.api_key {
            Some(_) => builder.header("x-api-key", &key),
            None => builder.bearer_auth(&key),
        };

        let resp = builder.json(&body).send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                TransportError::Transient { msg: e.to_string(), retry_after_ms: None }
            } else {
                TransportError::Fatal { msg: e.to_string() }
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after_ms = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|s| s * 1000);
            let text = resp.text().await.unwrap_or_default();
            if status.as_u16() == 429 || status.is_server_error() {
                return Err(TransportError::Transient { msg: format!("{status}: {text}"), retry_after_ms });
            }
            return Err(TransportError::Fatal { msg: format!("{status}: {text}") });
        }

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let mut byte_stream = resp.bytes_stream();
            let mut buf = String::new();
            let mut tool_acc: HashMap<u64, (String, String, String)> = HashMap::new();
            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx.send(ProviderEvent::Err(e.to_string())).await;
                        break;
                    }
                };
                buf.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(pos) = buf.find('\n') {
                    let line = buf[..pos].trim_end_matches('\r').to_string();
                    buf.drain(..=pos);
                    let Some(data) = line.strip_prefix("data: ") else { continue };
                    let Ok(v) = serde_json::from_str::<Value>(data.trim()) else { continue };
                    if let Some(ev) = parse_sse_event(&v, &mut tool_acc) {
                        if tx.send(ev).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Fold one Anthropic-shaped SSE event into zero or one [`ProviderEvent`]s,
/// accumulating streamed tool-call id/name/args keyed by content-block index.
fn parse_sse_event(v: &Value, tool_acc: &mut HashMap<u64, (String, String, String)>) -> Option<ProviderEvent> {
    match v["type"].as_str()? {
        "content_block_start" => {
            let index = v["index"].as_u64().unwrap_or(0);
            let block = &v["content_block"];
            if block["type"].as_str() == Some("tool_use") {
                let id = block["id"].as_str().unwrap_or_default().to_string();
                let name = block["name"].as_str().unwrap_or_default().to_string();
                tool_acc.insert(index, (id, name, String::new()));
            }
            None
        }
        "content_block_delta" => {
            let index = v["index"].as_u64().unwrap_or(0);
            let delta = &v["delta"];
            match delta["type"].as_str().unwrap_or_default() {
                "text_delta" => Some(ProviderEvent::Text(delta["text"].as_str().unwrap_or_default().to_string())),
                "thinking_delta" => {
                    Some(ProviderEvent::Thinking(delta["thinking"].as_str().unwrap_or_default().to_string()))
                }
                "input_json_delta" => {
                    let partial = delta["partial_json"].as_str().unwrap_or_default();
                    if let Some(acc) = tool_acc.get_mut(&index) {
                        acc.2.push_str(partial);
                    }
                    None
                }
                _ => None,
            }
        }
        "content_block_stop" => {
            let index = v["index"].as_u64().unwrap_or(0);
            tool_acc
                .remove(&index)
                .map(|(id, name, args)| ProviderEvent::ToolCall { id, name, args })
        }
        "message_delta" => {
            let usage = &v["usage"];
            if usage.is_object() {
                let in_tok = usage["input_tokens"].as_u64().unwrap_or(0);
                let out_tok = usage["output_tokens"].as_u64().unwrap_or(0);
                return Some(ProviderEvent::Usage(UsageTotals {
                    in_tok,
                    out_tok,
                    tot_tok: in_tok + out_tok,
                    cache_read: usage["cache_read_input_tokens"].as_u64(),
                    cache_write: usage["cache_creation_input_tokens"].as_u64(),
                }));
            }
            None
        }
        "message_stop" => Some(ProviderEvent::Stop(StopReason::Done)),
        "error" => Some(ProviderEvent::Err(v["error"]["message"].as_str().unwrap_or("provider error").to_string())),
        _ => None,
    }
}
