// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::io::{BufRead, BufReader};

use async_trait::async_trait;
use pz_events::{FailKind, OutputStream, ToolKind};
use serde::Deserialize;
use serde_json::json;
use walkdir::WalkDir;

use crate::builtin::bounded::ChunkBuilder;
use crate::tool::{HandlerCtx, HandlerOutput, ToolCall, ToolHandler};

const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 20_000;
const DEFAULT_MAX_RESULTS: usize = 200;

#[derive(Debug, Deserialize)]
struct Args {
    pattern: String,
    path: String,
    #[serde(default)]
    ignore_case: bool,
    max_results: Option<usize>,
}

pub struct GrepHandler {
    pub limit_bytes: usize,
}

impl Default for GrepHandler {
    fn default() -> Self {
        Self { limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES }
    }
}

fn matches(line: &str, pattern: &str, ignore_case: bool) -> bool {
    if ignore_case {
        line.to_ascii_lowercase().contains(&pattern.to_ascii_lowercase())
    } else {
        line.contains(pattern)
    }
}

#[async_trait]
impl ToolHandler for GrepHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Grep
    }

    fn name(&self) -> &'static str {
        "grep"
    }

    fn description(&self) -> &'static str {
        "Search files under a directory for lines containing a literal pattern."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string"},
                "path": {"type": "string"},
                "ignore_case": {"type": "boolean"},
                "max_results": {"type": "integer"}
            },
            "required": ["pattern", "path"]
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

        let mut out = String::new();
        let mut hits = 0usize;
        'walk: for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(file) = std::fs::File::open(entry.path()) else {
                continue;
            };
            let relpath = entry.path().strip_prefix(root).unwrap_or(entry.path());
            for (idx, line) in BufReader::new(file).lines().enumerate() {
                let Ok(line) = line else { continue };
                if matches(&line, &args.pattern, args.ignore_case) {
                    out.push_str(&format!("{}:{}:{}\n", relpath.display(), idx + 1, line));
                    hits += 1;
                    if hits >= max_results {
                        break 'walk;
                    }
                }
            }
        }

        let mut builder = ChunkBuilder::new(call.call_id.clone(), ctx.clock.now_ms(), self.limit_bytes);
        if let Some(meta) = builder.push(OutputStream::Stdout, &out) {
            builder.push_meta(&meta);
        }
        Ok(HandlerOutput::ok(0, builder.finish()))
    }
}
