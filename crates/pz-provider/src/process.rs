// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::process::Stdio;

use async_trait::async_trait;
use pz_events::{ProviderEvent, StopReason, UsageTotals};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use crate::retry::TransportError;
use crate::transport::{ProviderStream, Transport};
use crate::types::Req;

/// Launches an external command, writes the request as JSON to its stdin,
/// and parses streaming events from its stdout (spec §4.3 "Process
/// transport"). Used for tests and user-supplied `--provider-cmd` commands.
pub struct ProcessTransport {
    pub cmd: String,
}

impl ProcessTransport {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }
}

/// Wire shape for the JSONL variant of the stdout protocol; deserialized
/// then folded into [`ProviderEvent`], which itself carries no serde impls.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    Text { text: String },
    Thinking { text: String },
    ToolCall { id: String, name: String, args: String },
    ToolResult { id: String, out: String, is_err: bool },
    Usage { usage: UsageTotals },
    Stop { reason: WireStopReason },
    Err { msg: String },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum WireStopReason {
    Done,
    MaxOut,
    Tool,
    Canceled,
    Err,
}

impl From<WireStopReason> for StopReason {
    fn from(r: WireStopReason) -> Self {
        match r {
            WireStopReason::Done => StopReason::Done,
            WireStopReason::MaxOut => StopReason::MaxOut,
            WireStopReason::Tool => StopReason::Tool,
            WireStopReason::Canceled => StopReason::Canceled,
            WireStopReason::Err => StopReason::Err,
        }
    }
}

impl From<WireEvent> for ProviderEvent {
    fn from(w: WireEvent) -> Self {
        match w {
            WireEvent::Text { text } => ProviderEvent::Text(text),
            WireEvent::Thinking { text } => ProviderEvent::Thinking(text),
            WireEvent::ToolCall { id, name, args } => ProviderEvent::ToolCall { id, name, args },
            WireEvent::ToolResult { id, out, is_err } => ProviderEvent::ToolResult { id, out, is_err },
            WireEvent::Usage { usage } => ProviderEvent::Usage(usage),
            WireEvent::Stop { reason } => ProviderEvent::Stop(reason.into()),
            WireEvent::Err { msg } => ProviderEvent::Err(msg),
        }
    }
}

fn parse_compact_stop(rest: &str) -> StopReason {
    match rest {
        "done" => StopReason::Done,
        "max_turns" | "max_out" => StopReason::MaxOut,
        "tool" => StopReason::Tool,
        "canceled" => StopReason::Canceled,
        _ => StopReason::Err,
    }
}

/// Parse one line of the compact text protocol or a JSONL-encoded event.
/// Unparseable lines are dropped with a warning rather than aborting the
/// whole stream.
pub(crate) fn parse_event_line(line: &str) -> Option<ProviderEvent> {
    if line.starts_with('{') {
        return match serde_json::from_str::<WireEvent>(line) {
            Ok(ev) => Some(ev.into()),
            Err(e) => {
                warn!(error = %e, line, "unparseable provider event line");
                None
            }
        };
    }
    let (tag, rest) = line.split_once(':')?;
    match tag {
        "text" => Some(ProviderEvent::Text(rest.to_string())),
        "thinking" => Some(ProviderEvent::Thinking(rest.to_string())),
        "tool_call" => {
            let mut parts = rest.splitn(3, '|');
            let id = parts.next()?.to_string();
            let name = parts.next()?.to_string();
            let args = parts.next().unwrap_or("").to_string();
            Some(ProviderEvent::ToolCall { id, name, args })
        }
        "stop" => Some(ProviderEvent::Stop(parse_compact_stop(rest))),
        "usage" => {
            let mut nums = rest.split(',').filter_map(|s| s.trim().parse::<u64>().ok());
            let in_tok = nums.next().unwrap_or(0);
            let out_tok = nums.next().unwrap_or(0);
            Some(ProviderEvent::Usage(UsageTotals {
                in_tok,
                out_tok,
                tot_tok: in_tok + out_tok,
                cache_read: nums.next(),
                cache_write: nums.next(),
            }))
        }
        "err" => Some(ProviderEvent::Err(rest.to_string())),
        _ => {
            warn!(line, "unrecognized compact protocol tag");
            None
        }
    }
}

#[async_trait]
impl Transport for ProcessTransport {
    async fn start(&self, req: Req) -> Result<ProviderStream, TransportError> {
        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg(&self.cmd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TransportError::Fatal { msg: format!("spawn {}: {e}", self.cmd) })?;

        let payload = serde_json::to_vec(&req)
            .map_err(|e| TransportError::Fatal { msg: format!("encode request: {e}") })?;
        let mut stdin = child.stdin.take().expect("stdin piped");
        stdin
            .write_all(&payload)
            .await
            .map_err(|e| TransportError::Transient { msg: format!("write stdin: {e}"), retry_after_ms: None })?;
        drop(stdin);

        let stdout = child.stdout.take().expect("stdout piped");
        let stderr = child.stderr.take().expect("stderr piped");

        let (tx, rx) = mpsc::channel(64);

        let tx_err = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx_err.send(ProviderEvent::Err(line)).await.is_err() {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(ev) = parse_event_line(&line) {
                    if tx.send(ev).await.is_err() {
                        break;
                    }
                }
            }
            // Reap the child so it doesn't zombie even if the caller drops
            // the stream before it's exhausted.
            let _ = child.wait().await;
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn req() -> Req {
        Req {
            model: "m".into(),
            provider_label: "process".into(),
            msgs: vec![],
            tools: vec![],
            opts: Default::default(),
        }
    }

    #[test]
    fn parses_compact_text_events() {
        assert!(matches!(parse_event_line("text:hi"), Some(ProviderEvent::Text(t)) if t == "hi"));
        assert!(matches!(
            parse_event_line("tool_call:c1|bash|{}"),
            Some(ProviderEvent::ToolCall { id, name, args })
                if id == "c1" && name == "bash" && args == "{}"
        ));
        assert!(matches!(parse_event_line("stop:done"), Some(ProviderEvent::Stop(StopReason::Done))));
        assert!(matches!(
            parse_event_line("usage:1,2,3,4"),
            Some(ProviderEvent::Usage(u)) if u.in_tok == 1 && u.cache_write == Some(4)
        ));
    }

    #[test]
    fn parses_json_event_line() {
        let line = r#"{"type":"text","text":"hi"}"#;
        assert!(matches!(parse_event_line(line), Some(ProviderEvent::Text(t)) if t == "hi"));
    }

    #[test]
    fn unrecognized_line_is_none() {
        assert!(parse_event_line("garbage no colon").is_none());
    }

    #[tokio::test]
    async fn streams_events_from_a_real_command() {
        let transport = ProcessTransport::new(
            "cat > /dev/null; printf 'text:hello\\nstop:done\\n'",
        );
        let mut stream = transport.start(req()).await.unwrap();
        let first = stream.next().await.unwrap();
        assert!(matches!(first, ProviderEvent::Text(t) if t == "hello"));
        let second = stream.next().await.unwrap();
        assert!(matches!(second, ProviderEvent::Stop(StopReason::Done)));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn stderr_output_surfaces_as_err_events() {
        let transport = ProcessTransport::new("cat > /dev/null; echo boom 1>&2");
        let mut stream = transport.start(req()).await.unwrap();
        let ev = stream.next().await.unwrap();
        assert!(matches!(ev, ProviderEvent::Err(msg) if msg == "boom"));
    }
}
