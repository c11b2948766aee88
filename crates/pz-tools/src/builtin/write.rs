// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::io::Write as _;

use async_trait::async_trait;
use pz_events::{FailKind, ToolKind};
use serde::Deserialize;
use serde_json::json;

use crate::tool::{HandlerCtx, HandlerOutput, ToolCall, ToolHandler};

#[derive(Debug, Deserialize)]
struct Args {
    path: String,
    text: String,
    #[serde(default)]
    append: bool,
}

pub struct WriteHandler;

#[async_trait]
impl ToolHandler for WriteHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Write
    }

    fn name(&self) -> &'static str {
        "write"
    }

    fn description(&self) -> &'static str {
        "Write (or append) text to a file. The parent directory must already exist."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "text": {"type": "string"},
                "append": {"type": "boolean"}
            },
            "required": ["path", "text"]
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

        let path = std::path::Path::new(&args.path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Ok(HandlerOutput::failed(
                    FailKind::NotFound,
                    format!("parent directory does not exist: {}", parent.display()),
                ));
            }
        }

        let result = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .append(args.append)
            .truncate(!args.append)
            .open(path)
            .and_then(|mut f| f.write_all(args.text.as_bytes()));

        match result {
            Ok(()) => Ok(HandlerOutput::ok(0, Vec::new())),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                Ok(HandlerOutput::failed(FailKind::Denied, format!("{}: permission denied", args.path)))
            }
            Err(e) => Ok(HandlerOutput::failed(FailKind::Io, e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pz_events::SystemClock;

    fn ctx() -> HandlerCtx<'static> {
        HandlerCtx { clock: &SystemClock, ask_hook: None }
    }

    fn call(args: &str) -> ToolCall {
        ToolCall { call_id: "c1".into(), name: "write".into(), args: args.into() }
    }

    #[tokio::test]
    async fn write_creates_file_with_exact_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let args = format!(r#"{{"path":"{}","text":"hello"}}"#, path.display());
        let out = WriteHandler.run(&call(&args), &ctx()).await.unwrap();
        assert!(matches!(out.outcome, pz_events::ToolFinal::Ok { code: 0 }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    }

    #[tokio::test]
    async fn append_true_preserves_existing_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, "a").unwrap();
        let args = format!(r#"{{"path":"{}","text":"b","append":true}}"#, path.display());
        WriteHandler.run(&call(&args), &ctx()).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ab");
    }

    #[tokio::test]
    async fn write_without_append_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, "longer original").unwrap();
        let args = format!(r#"{{"path":"{}","text":"x"}}"#, path.display());
        WriteHandler.run(&call(&args), &ctx()).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "x");
    }

    #[tokio::test]
    async fn missing_parent_directory_is_not_found() {
        let args = r#"{"path":"/nonexistent/dir/out.txt","text":"x"}"#;
        let out = WriteHandler.run(&call(args), &ctx()).await.unwrap();
        match out.outcome {
            pz_events::ToolFinal::Failed { kind, .. } => assert_eq!(kind, FailKind::NotFound),
            other => panic!("{other:?}"),
        }
    }
}
