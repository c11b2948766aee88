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
    question: String,
}

/// Surfaces a question to whatever's on the other end of the session. Only
/// meaningful when the sink supplied an [`crate::tool::AskHook`]; print/json/rpc
/// modes never do, so this always fails there rather than blocking forever
/// on input nobody can supply.
pub struct AskHandler;

#[async_trait]
impl ToolHandler for AskHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Ask
    }

    fn name(&self) -> &'static str {
        "ask"
    }

    fn description(&self) -> &'static str {
        "Ask the user a question and wait for their reply. Interactive sessions only."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "question": {"type": "string"}
            },
            "required": ["question"]
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
        if args.question.is_empty() {
            return Ok(HandlerOutput::failed(FailKind::InvalidArgs, "question must not be empty"));
        }

        let Some(hook) = ctx.ask_hook else {
            return Ok(HandlerOutput::failed(FailKind::InvalidArgs, "interactive required"));
        };
        let reply = hook.ask(&args.question);

        let mut builder = ChunkBuilder::new(call.call_id.clone(), ctx.clock.now_ms(), OUTPUT_LIMIT_BYTES);
        if let Some(meta) = builder.push(OutputStream::Stdout, &reply) {
            builder.push_meta(&meta);
        }
        Ok(HandlerOutput::ok(0, builder.finish()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pz_events::SystemClock;

    struct EchoHook;
    impl crate::tool::AskHook for EchoHook {
        fn ask(&self, question: &str) -> String {
            format!("answer to: {question}")
        }
    }

    fn call(args: &str) -> ToolCall {
        ToolCall { call_id: "c1".into(), name: "ask".into(), args: args.into() }
    }

    #[tokio::test]
    async fn without_hook_fails_invalid_args() {
        let ctx = HandlerCtx { clock: &SystemClock, ask_hook: None };
        let out = AskHandler.run(&call(r#"{"question":"ok?"}"#), &ctx).await.unwrap();
        match out.outcome {
            pz_events::ToolFinal::Failed { kind, msg, .. } => {
                assert_eq!(kind, FailKind::InvalidArgs);
                assert_eq!(msg, "interactive required");
            }
            other => panic!("{other:?}"),
        }
    }

    #[tokio::test]
    async fn with_hook_returns_its_reply() {
        let hook = EchoHook;
        let ctx = HandlerCtx { clock: &SystemClock, ask_hook: Some(&hook) };
        let out = AskHandler.run(&call(r#"{"question":"ok?"}"#), &ctx).await.unwrap();
        assert!(matches!(out.outcome, pz_events::ToolFinal::Ok { code: 0 }));
        assert_eq!(out.chunks[0].chunk, b"answer to: ok?".to_vec());
    }

    #[tokio::test]
    async fn empty_question_is_invalid_args() {
        let ctx = HandlerCtx { clock: &SystemClock, ask_hook: None };
        let out = AskHandler.run(&call(r#"{"question":""}"#), &ctx).await.unwrap();
        match out.outcome {
            pz_events::ToolFinal::Failed { kind, .. } => assert_eq!(kind, FailKind::InvalidArgs),
            other => panic!("{other:?}"),
        }
    }
}
