// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use pz_events::{FailKind, OutputStream, ToolKind};
use serde::Deserialize;
use serde_json::json;

use crate::builtin::bounded::ChunkBuilder;
use crate::tool::{HandlerCtx, HandlerOutput, ToolCall, ToolHandler};

const OUTPUT_LIMIT_BYTES: usize = 20_000;

#[derive(Debug, Deserialize)]
struct Args {
    path: String,
    #[serde(default)]
    all: bool,
}

pub struct LsHandler;

#[async_trait]
impl ToolHandler for LsHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Ls
    }

    fn name(&self) -> &'static str {
        "ls"
    }

    fn description(&self) -> &'static str {
        "List a directory's immediate entries, sorted, directories suffixed with `/`."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "all": {"type": "boolean"}
            },
            "required": ["path"]
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

        let entries = match std::fs::read_dir(&args.path) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(HandlerOutput::failed(FailKind::NotFound, format!("{}: not found", args.path)));
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Ok(HandlerOutput::failed(FailKind::Denied, format!("{}: permission denied", args.path)));
            }
            Err(e) => return Ok(HandlerOutput::failed(FailKind::Io, e.to_string())),
        };

        let mut names: Vec<String> = Vec::new();
        for entry in entries {
            let Ok(entry) = entry else { continue };
            let name = entry.file_name().to_string_lossy().to_string();
            if !args.all && name.starts_with('.') {
                continue;
            }
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            names.push(if is_dir { format!("{name}/") } else { name });
        }
        names.sort();

        let mut out = String::new();
        for name in &names {
            out.push_str(name);
            out.push('\n');
        }

        let mut builder = ChunkBuilder::new(call.call_id.clone(), ctx.clock.now_ms(), OUTPUT_LIMIT_BYTES);
        if let Some(meta) = builder.push(OutputStream::Stdout, &out) {
            builder.push_meta(&meta);
        }
        Ok(HandlerOutput::ok(0, builder.finish()))
    }
}
