// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use pz_events::{FailKind, OutputStream, ToolKind};
use serde::Deserialize;
use serde_json::json;
use walkdir::WalkDir;

use crate::builtin::bounded::ChunkBuilder;
use crate::tool::{HandlerCtx, HandlerOutput, ToolCall, ToolHandler};

const OUTPUT_LIMIT_BYTES: usize = 20_000;
const DEFAULT_MAX_RESULTS: usize = 200;

#[derive(Debug, Deserialize)]
struct Args {
    path: String,
    pattern: String,
    max_results: Option<usize>,
}

pub struct FindHandler;

#[async_trait]
impl ToolHandler for FindHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Find
    }

    fn name(&self) -> &'static str {
        "find"
    }

    fn description(&self) -> &'static str {
        "Find files under a directory whose basename contains a literal substring."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "pattern": {"type": "string"},
                "max_results": {"type": "integer"}
            },
            "required": ["path", "pattern"]
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
        if args.pattern.is_empty() {
            return Ok(HandlerOutput::failed(FailKind::InvalidArgs, "pattern must not be empty"));
        }
        let root = std::path::Path::new(&args.path);
        if !root.is_dir() {
            return Ok(HandlerOutput::failed(FailKind::NotFound, format!("{}: not a directory", args.path)));
        }
        let max_results = args.max_results.unwrap_or(DEFAULT_MAX_RESULTS);

        let mut hits: Vec<String> = Vec::new();
        for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if name.contains(&args.pattern) {
                let relpath = entry.path().strip_prefix(root).unwrap_or(entry.path());
                hits.push(relpath.display().to_string());
            }
            // Keep scanning past max_results so the sort below is stable
            // over the whole tree rather than just whatever order walkdir
            // happened to visit first; cap the working set so a huge tree
            // can't make this unbounded.
            if hits.len() >= max_results.saturating_mul(8) {
                break;
            }
        }
        hits.sort();
        hits.truncate(max_results);

        let mut out = String::new();
        for hit in &hits {
            out.push_str(hit);
            out.push('\n');
        }

        let mut builder = ChunkBuilder::new(call.call_id.clone(), ctx.clock.now_ms(), OUTPUT_LIMIT_BYTES);
        if let Some(meta) = builder.push(OutputStream::Stdout, &out) {
            builder.push_meta(&meta);
        }
        Ok(HandlerOutput::ok(0, builder.finish()))
    }
}
