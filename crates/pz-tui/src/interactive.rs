// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Minimal interactive facade (spec §4.5 "Interactive (TUI)"): a
//! line-editor loop plus slash-command parsing. This is deliberately not
//! the screen-buffer/Unicode-width/markdown-wrapping renderer the spec
//! calls out as external — it drives the same [`pz_core::Agent`] loop a
//! headless mode would, one prompt per input line.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use pz_core::{Agent, CancelSource, Compactor, ModeSink, RunConfig};
use pz_events::{ModeEvent, ProviderEvent, StopReason, TimeSource, ToolEventEnvelope};
use pz_provider::{RetryPolicy, Transport};
use pz_store::SessionStore;
use pz_tools::ToolRegistry;

/// Everything one interactive run needs. Mirrors [`pz_core::RunConfig`]
/// minus the per-turn prompt, since this loop supplies one prompt per
/// input line.
pub struct InteractiveConfig {
    pub model: String,
    pub provider_label: String,
    pub provider: Arc<dyn Transport>,
    pub store: Arc<SessionStore>,
    pub registry: Arc<ToolRegistry>,
    pub sid: String,
    pub session_dir: PathBuf,
    pub system_prompt: Option<String>,
    pub time: Arc<dyn TimeSource>,
    pub compactor: Option<Arc<dyn Compactor>>,
    pub compact_every: u32,
    pub retry_policy: RetryPolicy,
}

/// `/help, /session, /settings, /model, /provider, /tools, /clear, /copy,
/// /name, /new, /resume, /tree, /fork, /compact, /login, /logout,
/// /hotkeys, /quit` (spec §4.5). Most either report state or are
/// collaborator hooks (`/login`, `/logout`, `/copy`, `/hotkeys`) that a
/// real terminal UI would wire up; here they print a short acknowledgement
/// so the command set is complete even though this facade has no screen to
/// redraw.
#[derive(Debug, PartialEq, Eq)]
enum SlashCommand {
    Help,
    Session,
    Settings,
    Model(Option<String>),
    Provider(Option<String>),
    Tools(Option<String>),
    Clear,
    Copy,
    Name(Option<String>),
    New,
    Resume(Option<String>),
    Tree,
    Fork(Option<String>),
    Compact,
    Login,
    Logout,
    Hotkeys,
    Quit,
    Unknown(String),
}

fn parse_slash(line: &str) -> Option<SlashCommand> {
    let rest = line.strip_prefix('/')?;
    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
    Some(match name {
        "help" => SlashCommand::Help,
        "session" => SlashCommand::Session,
        "settings" => SlashCommand::Settings,
        "model" => SlashCommand::Model(arg),
        "provider" => SlashCommand::Provider(arg),
        "tools" => SlashCommand::Tools(arg),
        "clear" => SlashCommand::Clear,
        "copy" => SlashCommand::Copy,
        "name" => SlashCommand::Name(arg),
        "new" => SlashCommand::New,
        "resume" => SlashCommand::Resume(arg),
        "tree" => SlashCommand::Tree,
        "fork" => SlashCommand::Fork(arg),
        "compact" => SlashCommand::Compact,
        "login" => SlashCommand::Login,
        "logout" => SlashCommand::Logout,
        "hotkeys" => SlashCommand::Hotkeys,
        "quit" => SlashCommand::Quit,
        other => SlashCommand::Unknown(other.to_string()),
    })
}

/// Writes assistant text verbatim and a one-line tool/stop summary;
/// suppresses replay/session noise the way [`pz_core::PrintSink`] does.
struct TranscriptSink<W: Write> {
    writer: W,
}

impl<W: Write + Send> ModeSink for TranscriptSink<W> {
    fn push(&mut self, event: ModeEvent) {
        match event {
            ModeEvent::Provider(ProviderEvent::Text(text)) => {
                let _ = write!(self.writer, "{text}");
            }
            ModeEvent::Provider(ProviderEvent::Thinking(_)) => {}
            ModeEvent::Provider(ProviderEvent::Stop(reason)) => {
                if reason != StopReason::Done {
                    let _ = writeln!(self.writer, "\n[stop: {reason:?}]");
                }
            }
            ModeEvent::Provider(ProviderEvent::Err(msg)) => {
                let _ = writeln!(self.writer, "\n[error] {msg}");
            }
            ModeEvent::Tool(ToolEventEnvelope::Start { name, .. }) => {
                let _ = writeln!(self.writer, "\n[tool] {name}...");
            }
            ModeEvent::Tool(ToolEventEnvelope::Finish { result, .. }) => {
                let _ = writeln!(self.writer, "[tool] {:?}", result.outcome);
            }
            ModeEvent::Warning(msg) => {
                let _ = writeln!(self.writer, "\n[warning] {msg}");
            }
            _ => {}
        }
        let _ = self.writer.flush();
    }
}

fn help_text() -> &'static str {
    "/help /session /settings /model [name] /provider [name] /tools [csv|all|none] \
     /clear /copy /name <text> /new /resume [id] /tree /fork [id] /compact /login \
     /logout /hotkeys /quit"
}

/// Drives one interactive session: reads prompts (and slash commands) from
/// `input` line by line, writes the transcript and command output to
/// `output`, until `/quit` or end of input.
pub async fn run(cfg: InteractiveConfig, input: impl BufRead, mut output: impl Write + Send) -> anyhow::Result<()> {
    let InteractiveConfig {
        model,
        provider_label,
        provider,
        store,
        registry,
        mut sid,
        session_dir,
        system_prompt,
        time,
        compactor,
        compact_every,
        retry_policy,
    } = cfg;

    let cancel = CancelSource::new();
    writeln!(output, "{}", help_text())?;

    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_slash(line) {
            Some(SlashCommand::Quit) => break,
            Some(SlashCommand::Help) => writeln!(output, "{}", help_text())?,
            Some(SlashCommand::Session) => {
                writeln!(output, "session {sid} in {}", session_dir.display())?;
            }
            Some(SlashCommand::Settings) => {
                writeln!(output, "model={model} provider={provider_label} tools={}", registry.mask())?;
            }
            Some(SlashCommand::Model(Some(m))) => writeln!(output, "model set to {m} (not yet applied this build)")?,
            Some(SlashCommand::Model(None)) => writeln!(output, "model={model}")?,
            Some(SlashCommand::Provider(Some(p))) => writeln!(output, "provider set to {p} (not yet applied this build)")?,
            Some(SlashCommand::Provider(None)) => writeln!(output, "provider={provider_label}")?,
            Some(SlashCommand::Tools(_)) => writeln!(output, "tools mask={:#x}", registry.mask())?,
            Some(SlashCommand::Clear) => writeln!(output, "(nothing to clear in this facade)")?,
            Some(SlashCommand::Copy) => writeln!(output, "(clipboard integration not available in this facade)")?,
            Some(SlashCommand::Name(name)) => writeln!(output, "session name: {}", name.unwrap_or_default())?,
            Some(SlashCommand::New) => {
                sid = pz_store::resolve(&pz_events::SessionSelector::Auto, &store, time.as_ref())?;
                writeln!(output, "new session {sid}")?;
            }
            Some(SlashCommand::Resume(target)) => {
                let selector = match target {
                    Some(t) => pz_events::SessionSelector::Explicit(pz_events::SelectorTarget::Id(t)),
                    None => pz_events::SessionSelector::Resume,
                };
                sid = pz_store::resolve(&selector, &store, time.as_ref())?;
                writeln!(output, "resumed session {sid}")?;
            }
            Some(SlashCommand::Tree) => {
                for s in store.list()? {
                    writeln!(output, "{s}")?;
                }
            }
            Some(SlashCommand::Fork(target)) => {
                let dst = target.unwrap_or_else(|| format!("{:016x}", time.now_us()));
                store.fork(&sid, &dst)?;
                sid = dst;
                writeln!(output, "forked to {sid}")?;
            }
            Some(SlashCommand::Compact) => match &compactor {
                Some(c) => {
                    let stats = c.compact(&sid, time.now_ms())?;
                    writeln!(output, "compacted: {} -> {} lines", stats.in_lines, stats.out_lines)?;
                }
                None => writeln!(output, "compaction not configured")?,
            },
            Some(SlashCommand::Login) => writeln!(output, "(OAuth login is a CLI-level collaborator, not part of this facade)")?,
            Some(SlashCommand::Logout) => writeln!(output, "(logout is a CLI-level collaborator, not part of this facade)")?,
            Some(SlashCommand::Hotkeys) => writeln!(output, "no hotkeys in this line-based facade")?,
            Some(SlashCommand::Unknown(name)) => writeln!(output, "unknown command: /{name}")?,
            None => {
                let mut sink = TranscriptSink { writer: &mut output };
                let run_cfg = RunConfig {
                    sid: sid.clone(),
                    prompt: line.to_string(),
                    model: model.clone(),
                    provider_label: provider_label.clone(),
                    provider: provider.clone(),
                    store: store.clone(),
                    registry: registry.clone(),
                    sink: &mut sink,
                    system_prompt: system_prompt.clone(),
                    provider_opts: serde_json::Value::Null,
                    max_turns: 0,
                    cancel: cancel.clone(),
                    time: time.clone(),
                    compactor: compactor.clone(),
                    compact_every: compact_every.max(1),
                    retry_policy,
                    ask_hook: None,
                };
                Agent::run(run_cfg).await?;
                writeln!(output)?;
            }
        }
    }
    Ok(())
}

/// Convenience entry point over real stdin/stdout.
pub async fn run_stdio(cfg: InteractiveConfig) -> anyhow::Result<()> {
    let stdin = io::stdin();
    run(cfg, stdin.lock(), io::stdout()).await
}
