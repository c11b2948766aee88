// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::io::{BufRead, BufReader};

use async_trait::async_trait;
use pz_events::{FailKind, OutputStream, ToolKind};
use serde::Deserialize;
use serde_json::json;

use crate::builtin::bounded::ChunkBuilder;
use crate::tool::{HandlerCtx, HandlerOutput, ToolCall, ToolHandler};

/// Combined output ceiling; large enough for a generous window, small
/// enough to keep a context window from blowing up on one read.
const OUTPUT_LIMIT_BYTES: usize = 20_000;

#[derive(Debug, Deserialize)]
struct Args {
    path: String,
    from_line: Option<usize>,
    to_line: Option<usize>,
}

pub struct ReadHandler;

#[async_trait]
impl ToolHandler for ReadHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Read
    }

    fn name(&self) -> &'static str {
        "read"
    }

    fn description(&self) -> &'static str {
        "Read a file, optionally a 1-indexed inclusive line range (from_line..to_line)."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "from_line": {"type": "integer"},
                "to_line": {"type": "integer"}
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

        if let Some(from) = args.from_line {
            if from == 0 {
                return Ok(HandlerOutput::failed(FailKind::InvalidArgs, "from_line must be > 0"));
            }
        }
        if let (Some(from), Some(to)) = (args.from_line, args.to_line) {
            if to < from {
                return Ok(HandlerOutput::failed(FailKind::InvalidArgs, "to_line must be >= from_line"));
            }
        }
        let from = args.from_line.unwrap_or(1);
        let to = args.to_line.unwrap_or(usize::MAX);

        let file = match std::fs::File::open(&args.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(HandlerOutput::failed(FailKind::NotFound, format!("{}: not found", args.path)));
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Ok(HandlerOutput::failed(FailKind::Denied, format!("{}: permission denied", args.path)));
            }
            Err(e) => return Ok(HandlerOutput::failed(FailKind::Io, e.to_string())),
        };

        let reader = BufReader::new(file);
        let mut selected = String::new();
        for (lineno, line) in reader.lines().enumerate() {
            let lineno = lineno + 1;
            if lineno < from {
                continue;
            }
            if lineno > to {
                break;
            }
            let line = line.unwrap_or_default();
            selected.push_str(&line);
            selected.push('\n');
        }

        let mut builder = ChunkBuilder::new(call.call_id.clone(), ctx.clock.now_ms(), OUTPUT_LIMIT_BYTES);
        if let Some(meta) = builder.push(OutputStream::Stdout, &selected) {
            builder.push_meta(&meta);
        }
        Ok(HandlerOutput::ok(0, builder.finish()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pz_events::SystemClock;
    use std::io::Write;

    fn ctx() -> HandlerCtx<'static> {
        HandlerCtx { clock: &SystemClock, ask_hook: None }
    }

    fn call(args: &str) -> ToolCall {
        ToolCall { call_id: "c1".into(), name: "read".into(), args: args.into() }
    }

    #[tokio::test]
    async fn reads_whole_file_by_default() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "one").unwrap();
        writeln!(f, "two").unwrap();
        let args = format!(r#"{{"path":"{}"}}"#, f.path().display());
        let out = ReadHandler.run(&call(&args), &ctx()).await.unwrap();
        assert!(matches!(out.outcome, pz_events::ToolFinal::Ok { code: 0 }));
        assert_eq!(out.chunks[0].chunk, b"one\ntwo\n".to_vec());
    }

    #[tokio::test]
    async fn selects_inclusive_line_range() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        for i in 1..=5 {
            writeln!(f, "line{i}").unwrap();
        }
        let args = format!(r#"{{"path":"{}","from_line":2,"to_line":3}}"#, f.path().display());
        let out = ReadHandler.run(&call(&args), &ctx()).await.unwrap();
        assert_eq!(out.chunks[0].chunk, b"line2\nline3\n".to_vec());
    }

    #[tokio::test]
    async fn from_line_zero_is_invalid_args() {
        let args = r#"{"path":"/tmp/x","from_line":0}"#;
        let out = ReadHandler.run(&call(args), &ctx()).await.unwrap();
        match out.outcome {
            pz_events::ToolFinal::Failed { kind, .. } => assert_eq!(kind, FailKind::InvalidArgs),
            other => panic!("{other:?}"),
        }
    }

    #[tokio::test]
    async fn to_line_before_from_line_is_invalid_args() {
        let args = r#"{"path":"/tmp/x","from_line":5,"to_line":2}"#;
        let out = ReadHandler.run(&call(args), &ctx()).await.unwrap();
        match out.outcome {
            pz_events::ToolFinal::Failed { kind, .. } => assert_eq!(kind, FailKind::InvalidArgs),
            other => panic!("{other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let args = r#"{"path":"/nonexistent/path/xyz"}"#;
        let out = ReadHandler.run(&call(args), &ctx()).await.unwrap();
        match out.outcome {
            pz_events::ToolFinal::Failed { kind, .. } => assert_eq!(kind, FailKind::NotFound),
            other => panic!("{other:?}"),
        }
    }
}
