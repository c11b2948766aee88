// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::process::Stdio;

use async_trait::async_trait;
use pz_events::{FailKind, OutputStream, ToolKind};
use serde::Deserialize;
use serde_json::json;
use tokio::process::Command;

use crate::builtin::bounded::ChunkBuilder;
use crate::tool::{HandlerCtx, HandlerOutput, ToolCall, ToolHandler};

const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 20_000;

#[derive(Debug, Deserialize)]
struct Args {
    cmd: String,
    cwd: Option<String>,
    #[serde(default)]
    env: std::collections::BTreeMap<String, String>,
}

/// `max_bytes` is configurable per instance (spec §8 E7 exercises a handler
/// with `max_bytes=3`); production wiring uses [`BashHandler::default`].
pub struct BashHandler {
    pub max_bytes: usize,
}

impl Default for BashHandler {
    fn default() -> Self {
        Self { max_bytes: DEFAULT_OUTPUT_LIMIT_BYTES }
    }
}

#[async_trait]
impl ToolHandler for BashHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Bash
    }

    fn name(&self) -> &'static str {
        "bash"
    }

    fn description(&self) -> &'static str {
        "Run a command with `/bin/bash -lc <cmd>`; captures stdout and stderr separately."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "cmd": {"type": "string"},
                "cwd": {"type": "string"},
                "env": {"type": "object", "additionalProperties": {"type": "string"}}
            },
            "required": ["cmd"]
        })
    }

    async fn run(&self, call: &ToolCall, ctx: &HandlerCtx<'_>) -> anyhow::Result<HandlerOutput> {
        let args: Args = match serde_json::from_str(&call.args) {
            Ok(a) => a,
            Err(_) => {
                return Ok(HandlerOutput::failed(
                    FailKind::InvalidArgs,
                    format!("invalid tool arguments for {}", call.name),
                ))
            }
        };

        for key in args.env.keys() {
            if key.contains('=') || key.contains('\0') {
                return Ok(HandlerOutput::failed(FailKind::InvalidArgs, format!("invalid env key: {key}")));
            }
        }

        if let Some(cwd) = &args.cwd {
            if !std::path::Path::new(cwd).is_dir() {
                return Ok(HandlerOutput::failed(FailKind::NotFound, format!("{cwd}: not found")));
            }
        }

        let mut cmd = Command::new("/bin/bash");
        cmd.arg("-lc").arg(&args.cmd);
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);
        if let Some(cwd) = &args.cwd {
            cmd.current_dir(cwd);
        }
        for (k, v) in &args.env {
            cmd.env(k, v);
        }

        // tokio::process::Command::output() drains stdout and stderr
        // concurrently internally, so a command that fills one pipe while
        // we're not yet reading the other can never deadlock us.
        let output = match cmd.output().await {
            Ok(o) => o,
            Err(e) => return Ok(HandlerOutput::failed(FailKind::Exec, e.to_string())),
        };

        let mut builder = ChunkBuilder::new(call.call_id.clone(), ctx.clock.now_ms(), self.max_bytes);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if let Some(meta) = builder.push(OutputStream::Stdout, &stdout) {
            builder.push_meta(&meta);
        }
        if let Some(meta) = builder.push(OutputStream::Stderr, &stderr) {
            builder.push_meta(&meta);
        }
        let chunks = builder.finish();

        match output.status.code() {
            Some(0) => Ok(HandlerOutput::ok(0, chunks)),
            Some(code) => Ok(HandlerOutput {
                chunks,
                outcome: pz_events::ToolFinal::Failed {
                    code: Some(code),
                    kind: FailKind::Exec,
                    msg: format!("exit code {code}"),
                },
            }),
            // Killed by signal or otherwise stopped without an exit code.
            None => Ok(HandlerOutput {
                chunks,
                outcome: pz_events::ToolFinal::Failed {
                    code: None,
                    kind: FailKind::Exec,
                    msg: "terminated by signal".to_string(),
                },
            }),
        }
    }
}
