// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Request-reply RPC mode (spec §4.5/§6): one JSON envelope per input line,
//! one or more JSON reply lines per envelope. `prompt` drives a turn of the
//! agent loop, streaming its events to the same writer the replies go to;
//! every other command only mutates loop state.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use pz_events::{SelectorTarget, SessionSelector, TimeSource, ToolKind, ALL_KINDS, MASK_ALL, MASK_NONE};
use pz_provider::{RetryPolicy, Transport};
use pz_store::SessionStore;
use pz_tools::ToolRegistry;
use serde_json::{json, Value};

use crate::agent::{Agent, RunConfig};
use crate::cancel::CancelSource;
use crate::compact::Compactor;
use crate::sink::JsonlSink;

/// Canonical command names accepted by `cmd`/`type`, in the order spec
/// §4.5 lists them.
const COMMANDS: &[&str] = &[
    "prompt", "model", "provider", "tools", "new", "resume", "session", "tree", "fork", "compact", "help",
    "commands", "quit", "exit",
];

fn normalize_cmd(cmd: &str) -> &str {
    match cmd {
        "get_state" => "session",
        "set_model" => "model",
        "switch_session" => "resume",
        "follow_up" | "steer" => "prompt",
        "new_session" => "new",
        "get_commands" => "commands",
        other => other,
    }
}

/// Everything one [`RpcLoop`] needs for its whole lifetime.
pub struct RpcConfig {
    pub model: String,
    pub provider_label: String,
    pub provider: Arc<dyn Transport>,
    pub store: Arc<SessionStore>,
    pub session_dir: PathBuf,
    pub no_session: bool,
    pub system_prompt: Option<String>,
    pub time: Arc<dyn TimeSource>,
    pub compactor: Option<Arc<dyn Compactor>>,
    pub compact_every: u32,
    pub retry_policy: RetryPolicy,
}

pub struct RpcLoop {
    sid: String,
    model: String,
    provider_label: String,
    provider: Arc<dyn Transport>,
    store: Arc<SessionStore>,
    registry: Arc<ToolRegistry>,
    tool_mask: u8,
    session_dir: PathBuf,
    no_session: bool,
    system_prompt: Option<String>,
    time: Arc<dyn TimeSource>,
    compactor: Option<Arc<dyn Compactor>>,
    compact_every: u32,
    retry_policy: RetryPolicy,
    cancel: CancelSource,
}

impl RpcLoop {
    pub fn new(cfg: RpcConfig) -> Result<Self, pz_store::StoreError> {
        let sid = pz_store::resolve(&SessionSelector::Auto, &cfg.store, cfg.time.as_ref())?;
        Ok(Self {
            sid,
            model: cfg.model,
            provider_label: cfg.provider_label,
            provider: cfg.provider,
            store: cfg.store,
            registry: Arc::new(ToolRegistry::with_builtins()),
            tool_mask: MASK_ALL,
            session_dir: cfg.session_dir,
            no_session: cfg.no_session,
            system_prompt: cfg.system_prompt,
            time: cfg.time,
            compactor: cfg.compactor,
            compact_every: cfg.compact_every,
            retry_policy: cfg.retry_policy,
            cancel: CancelSource::new(),
        })
    }

    pub fn cancel_source(&self) -> CancelSource {
        self.cancel.clone()
    }

    /// Process one input line, writing zero or more JSON reply lines to
    /// `out`. Returns `false` when the loop should stop (`quit`/`exit`).
    pub async fn handle_line<W: Write + Send>(&mut self, line: &str, out: &mut W) -> bool {
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                write_line(out, json!({"type": "rpc_error", "id": Value::Null, "msg": format!("bad envelope: {e}")}));
                return true;
            }
        };
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let raw_cmd = value
            .get("cmd")
            .or_else(|| value.get("type"))
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let cmd = normalize_cmd(raw_cmd);

        match cmd {
            "prompt" => self.handle_prompt(&value, id, out).await,
            "model" => {
                let text = value.get("model").or_else(|| value.get("model_id")).and_then(|v| v.as_str());
                match text {
                    Some(m) => {
                        self.model = m.to_string();
                        ack(out, id, cmd, None);
                    }
                    None => error(out, id, "missing model"),
                }
                true
            }
            "provider" => {
                match value.get("provider").and_then(|v| v.as_str()) {
                    Some(p) => {
                        self.provider_label = p.to_string();
                        ack(out, id, cmd, None);
                    }
                    None => error(out, id, "missing provider"),
                }
                true
            }
            "tools" => {
                self.handle_tools(&value, id, out);
                true
            }
            "new" => {
                match pz_store::resolve(&SessionSelector::Auto, &self.store, self.time.as_ref()) {
                    Ok(sid) => {
                        self.sid = sid.clone();
                        ack(out, id, cmd, Some(json!({"sid": sid})));
                    }
                    Err(e) => error(out, id, &e.to_string()),
                }
                true
            }
            "resume" => {
                self.handle_resume(&value, id, out);
                true
            }
            "session" => {
                self.handle_session(id, out);
                true
            }
            "tree" => {
                match self.store.list() {
                    Ok(sessions) => write_line(out, json!({"type": "rpc_tree", "id": id, "sessions": sessions})),
                    Err(e) => error(out, id, &e.to_string()),
                }
                true
            }
            "fork" => {
                self.handle_fork(&value, id, out);
                true
            }
            "compact" => {
                self.handle_compact(id, out);
                true
            }
            "help" => {
                write_line(
                    out,
                    json!({"type": "rpc_help", "id": id, "text": "Supported commands: prompt, model, provider, tools, new, resume, session, tree, fork, compact, help, commands, quit, exit."}),
                );
                true
            }
            "commands" => {
                write_line(out, json!({"type": "rpc_commands", "id": id, "commands": COMMANDS}));
                true
            }
            "quit" | "exit" => {
                ack(out, id, cmd, None);
                false
            }
            other => {
                error(out, id, &format!("unknown command: {other}"));
                true
            }
        }
    }

    async fn handle_prompt<W: Write + Send>(&mut self, value: &Value, id: Value, out: &mut W) -> bool {
        let text = value.get("text").or_else(|| value.get("arg")).and_then(|v| v.as_str());
        let Some(text) = text else {
            error(out, id, "missing text");
            return true;
        };
        let mut sink = JsonlSink::new(&mut *out);
        let cfg = RunConfig {
            sid: self.sid.clone(),
            prompt: text.to_string(),
            model: self.model.clone(),
            provider_label: self.provider_label.clone(),
            provider: self.provider.clone(),
            store: self.store.clone(),
            registry: self.registry.clone(),
            sink: &mut sink,
            system_prompt: self.system_prompt.clone(),
            provider_opts: Value::Null,
            max_turns: 0,
            cancel: self.cancel.clone(),
            time: self.time.clone(),
            compactor: self.compactor.clone(),
            compact_every: self.compact_every.max(1),
            retry_policy: self.retry_policy,
            ask_hook: None,
        };
        match Agent::run(cfg).await {
            Ok(()) => ack(out, id, "prompt", None),
            Err(e) => error(out, id, &e.to_string()),
        }
        true
    }

    fn handle_tools(&mut self, value: &Value, id: Value, out: &mut impl Write) {
        let Some(spec) = value.get("tools").and_then(|v| v.as_str()) else {
            error(out, id, "missing tools");
            return;
        };
        let mask = match spec {
            "all" => MASK_ALL,
            "none" => MASK_NONE,
            csv => {
                let mut mask = MASK_NONE;
                for name in csv.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                    match ToolKind::from_str(name) {
                        Some(kind) => mask |= kind.mask(),
                        None => {
                            error(out, id, &format!("unknown tool kind: {name}"));
                            return;
                        }
                    }
                }
                mask
            }
        };
        self.tool_mask = mask;
        self.registry = Arc::new({
            let mut reg = ToolRegistry::with_builtins();
            reg.set_mask(mask);
            reg
        });
        ack(out, id, "tools", None);
    }

    fn handle_resume(&mut self, value: &Value, id: Value, out: &mut impl Write) {
        let target = value.get("session").or_else(|| value.get("sid")).and_then(|v| v.as_str());
        let selector = match target {
            Some(t) => SessionSelector::Explicit(SelectorTarget::Id(t.to_string())),
            None => SessionSelector::Resume,
        };
        match pz_store::resolve(&selector, &self.store, self.time.as_ref()) {
            Ok(sid) => {
                self.sid = sid.clone();
                ack(out, id, "resume", Some(json!({"sid": sid})));
            }
            Err(e) => error(out, id, &e.to_string()),
        }
    }

    fn handle_session(&self, id: Value, out: &mut impl Write) {
        let tools: Vec<&str> = ALL_KINDS.iter().filter(|k| self.tool_mask & k.mask() != 0).map(|k| k.as_str()).collect();
        let (session_bytes, session_lines) = match self.store.stats(&self.sid) {
            Ok(stats) => (stats.size_bytes, stats.event_count),
            Err(_) => (0, 0),
        };
        write_line(
            out,
            json!({
                "type": "rpc_session",
                "id": id,
                "sid": self.sid,
                "model": self.model,
                "provider": self.provider_label,
                "tools": tools,
                "session_dir": self.session_dir.display().to_string(),
                "session_file": self.session_dir.join(format!("{}.jsonl", self.sid)).display().to_string(),
                "session_bytes": session_bytes,
                "session_lines": session_lines,
                "no_session": self.no_session,
            }),
        );
    }

    fn handle_fork(&mut self, value: &Value, id: Value, out: &mut impl Write) {
        let dst = value
            .get("arg")
            .or_else(|| value.get("session"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{:016x}", self.time.now_us()));
        match self.store.fork(&self.sid, &dst) {
            Ok(()) => {
                self.sid = dst.clone();
                ack(out, id, "fork", Some(json!({"sid": dst})));
            }
            Err(e) => error(out, id, &e.to_string()),
        }
    }

    fn handle_compact(&self, id: Value, out: &mut impl Write) {
        let Some(compactor) = &self.compactor else {
            error(out, id, "compaction not configured");
            return;
        };
        match compactor.compact(&self.sid, self.time.now_ms()) {
            Ok(stats) => write_line(
                out,
                json!({
                    "type": "rpc_compact",
                    "id": id,
                    "in_lines": stats.in_lines,
                    "out_lines": stats.out_lines,
                    "in_bytes": stats.in_bytes,
                    "out_bytes": stats.out_bytes,
                }),
            ),
            Err(e) => error(out, id, &e.to_string()),
        }
    }
}

fn write_line(out: &mut impl Write, value: Value) {
    if let Ok(mut line) = serde_json::to_string(&value) {
        line.push('\n');
        let _ = out.write_all(line.as_bytes());
        let _ = out.flush();
    }
}

fn ack(out: &mut impl Write, id: Value, cmd: &str, extra: Option<Value>) {
    let mut obj = json!({"type": "rpc_ack", "id": id, "cmd": cmd});
    if let (Some(Value::Object(extra)), Value::Object(obj)) = (extra, &mut obj) {
        obj.extend(extra);
    }
    write_line(out, obj);
}

fn error(out: &mut impl Write, id: Value, msg: &str) {
    write_line(out, json!({"type": "rpc_error", "id": id, "msg": msg}));
}
