// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use pz_events::{FailKind, ToolKind};
use serde::Deserialize;
use serde_json::json;

use crate::tool::{HandlerCtx, HandlerOutput, ToolCall, ToolHandler};

/// Bound the file we're willing to load whole into memory for an edit.
const MAX_FILE_BYTES: usize = 5_000_000;

#[derive(Debug, Deserialize)]
struct Args {
    path: String,
    old: String,
    new: String,
    #[serde(default)]
    all: bool,
}

pub struct EditHandler;

#[async_trait]
impl ToolHandler for EditHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Edit
    }

    fn name(&self) -> &'static str {
        "edit"
    }

    fn description(&self) -> &'static str {
        "Replace a literal substring in a file: the first occurrence of `old`, or every \
         occurrence when `all` is set."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "old": {"type": "string"},
                "new": {"type": "string"},
                "all": {"type": "boolean"}
            },
            "required": ["path", "old", "new"]
        })
    }

    async fn run(&self, call: &ToolCall, _ctx: &HandlerCtx<'_>) -> anyhow::Result<HandlerOutput> {
        let args: Args = match serde_json::from_str(&call.args) {
            Ok(a) => a,
            Err(_) => {
                return Ok(HandlerOutput::failed(
                    FailKind::InvalidArgs,
                    format!("invalid tool arguments for {}", call.name),
                ))
            }
        };

        if args.old.is_empty() {
            return Ok(HandlerOutput::failed(FailKind::InvalidArgs, "old must not be empty"));
        }

        let meta = match std::fs::metadata(&args.path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(HandlerOutput::failed(FailKind::NotFound, format!("{}: not found", args.path)));
            }
            Err(e) => return Ok(HandlerOutput::failed(FailKind::Io, e.to_string())),
        };
        if meta.len() as usize > MAX_FILE_BYTES {
            return Ok(HandlerOutput::failed(
                FailKind::Io,
                format!("{} exceeds the {MAX_FILE_BYTES}-byte edit ceiling", args.path),
            ));
        }

        let content = match std::fs::read_to_string(&args.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Ok(HandlerOutput::failed(FailKind::Denied, format!("{}: permission denied", args.path)));
            }
            Err(e) => return Ok(HandlerOutput::failed(FailKind::Io, e.to_string())),
        };

        if !content.contains(&args.old) {
            return Ok(HandlerOutput::failed(FailKind::NotFound, format!("no match for old in {}", args.path)));
        }

        let replaced = if args.all {
            content.replace(&args.old, &args.new)
        } else {
            content.replacen(&args.old, &args.new, 1)
        };

        match std::fs::write(&args.path, replaced) {
            Ok(()) => Ok(HandlerOutput::ok(0, Vec::new())),
            Err(e) => Ok(HandlerOutput::failed(FailKind::Io, e.to_string())),
        }
    }
}
