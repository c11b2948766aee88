// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Mode};
use pz_config::{Config, ToolsSpec};
use pz_core::{Agent, JsonlSink, PrintSink, RpcConfig, RpcLoop, RunConfig, StoreCompactor};
use pz_events::{SelectorTarget, SessionSelector, StopReason, SystemClock, ToolKind, MASK_ALL, MASK_NONE};
use pz_store::SessionStore;
use pz_tools::ToolRegistry;

const EXIT_OK: u8 = 0;
const EXIT_RUNTIME: u8 = 1;
const EXIT_USAGE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let is_screen_mode = matches!(cli.mode, None | Some(Mode::Tui) | Some(Mode::Interactive));
    init_logging(cli.verbose, is_screen_mode);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("pz: error: {e:#}");
            ExitCode::from(EXIT_RUNTIME)
        }
    }
}

/// Suppresses tracing output in interactive/TUI mode (writing to stderr
/// would interleave with the transcript) unless `PZ_LOG_FILE` names a
/// sink; headless modes (`print`, `json`, `rpc`) log to stderr, gated by
/// `--verbose` and `RUST_LOG`.
fn init_logging(verbose: bool, is_screen_mode: bool) {
    if is_screen_mode {
        if let Ok(log_path) = std::env::var("PZ_LOG_FILE") {
            if let Ok(file) = std::fs::OpenOptions::new().create(true).append(true).open(&log_path) {
                let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
                let _ = tracing_subscriber::registry()
                    .with(fmt::layer().with_target(true).with_ansi(false).with_writer(std::sync::Mutex::new(file)))
                    .with(filter)
                    .try_init();
                return;
            }
        }
        let _ = tracing_subscriber::registry().with(EnvFilter::new("off")).try_init();
        return;
    }

    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .try_init();
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    let config = if cli.no_config {
        Config::default()
    } else {
        pz_config::load(cli.config.as_deref()).context("loading config")?
    };
    let config = pz_config::apply_env(config);

    let model = cli.model.clone().or(config.model).unwrap_or_else(|| "default".to_string());
    let provider_label = cli.provider.clone().or(config.provider).unwrap_or_else(|| "native".to_string());
    let provider_cmd = cli.provider_cmd.clone().or(config.provider_cmd);
    let session_dir = cli
        .session_dir
        .clone()
        .or(config.session_dir)
        .unwrap_or_else(|| PathBuf::from("./.pz/sessions"));
    let max_turns = if cli.max_turns != 0 { cli.max_turns } else { config.max_turns.unwrap_or(0) };
    let system_prompt_override = cli.system_prompt.clone().or(config.system_prompt);
    let append_system_prompt = cli.append_system_prompt.clone().or(config.append_system_prompt);
    let verbose = cli.verbose || config.verbose;

    let tool_spec = cli
        .tool_mask()
        .map(str::to_string)
        .or_else(|| config.tools.map(|t| match t.normalize() {
            ToolsSpec::All => "all".to_string(),
            ToolsSpec::None => "none".to_string(),
            ToolsSpec::Csv(s) => s,
        }));
    let tool_mask = match parse_tool_mask(tool_spec.as_deref()) {
        Ok(mask) => mask,
        Err(name) => {
            eprintln!("pz: error: unknown tool kind '{name}' — try one of: read,write,bash,edit,grep,find,ls,ask,all,none");
            return Ok(EXIT_USAGE);
        }
    };
    let mut registry = ToolRegistry::with_builtins();
    registry.set_mask(tool_mask);
    let registry = Arc::new(registry);

    let system_prompt = pz_core::system_prompt(system_prompt_override.as_deref(), append_system_prompt.as_deref());
    let provider_opts = serde_json::json!({ "thinking": cli.thinking.as_str() });

    let provider = pz_provider::resolve_transport(provider_cmd.as_deref());
    let time: Arc<dyn pz_events::TimeSource> = Arc::new(SystemClock);
    let retry_policy = pz_provider::RetryPolicy::default();

    if cli.no_session {
        return run_no_session(
            cli,
            model,
            provider_label,
            provider,
            registry,
            session_dir,
            system_prompt,
            provider_opts,
            max_turns,
            time,
            retry_policy,
            verbose,
        )
        .await;
    }

    std::fs::create_dir_all(&session_dir).with_context(|| format!("creating session directory {}", session_dir.display()))?;
    let store = Arc::new(SessionStore::open(&session_dir).context("opening session store")?);
    let compactor: Option<Arc<dyn pz_core::Compactor>> = Some(Arc::new(StoreCompactor::new(store.clone(), 20_000)));

    let selector = resolve_selector(&cli);
    let sid = match pz_store::resolve(&selector, &store, time.as_ref()) {
        Ok(sid) => sid,
        Err(e) => {
            eprintln!("pz: error: {} — next: pass --session <ID|PATH> or omit --continue/--resume to start fresh", e);
            return Ok(EXIT_USAGE);
        }
    };

    match cli.mode.clone().unwrap_or(Mode::Tui) {
        Mode::Print { prompt, prompt_flag } => {
            let Some(text) = prompt.or(prompt_flag) else {
                eprintln!("pz: error: print mode requires a prompt — next: pass it positionally or via --prompt-flag");
                return Ok(EXIT_USAGE);
            };
            let mut sink = PrintSink::new(io::stdout(), verbose);
            let run_cfg = RunConfig {
                sid,
                prompt: text,
                model,
                provider_label,
                provider,
                store,
                registry,
                sink: &mut sink,
                system_prompt: Some(system_prompt),
                provider_opts: provider_opts.clone(),
                max_turns,
                cancel: pz_core::CancelSource::new(),
                time,
                compactor,
                compact_every: 20,
                retry_policy,
                ask_hook: None,
            };
            Agent::run(run_cfg).await.context("running agent turn")?;
            println!();
            Ok(stop_exit_code(sink.last_stop))
        }
        Mode::Json { prompt } => {
            let mut sink = JsonlSink::new(io::stdout());
            let run_cfg = RunConfig {
                sid,
                prompt,
                model,
                provider_label,
                provider,
                store,
                registry,
                sink: &mut sink,
                system_prompt: Some(system_prompt),
                provider_opts: provider_opts.clone(),
                max_turns,
                cancel: pz_core::CancelSource::new(),
                time,
                compactor,
                compact_every: 20,
                retry_policy,
                ask_hook: None,
            };
            Agent::run(run_cfg).await.context("running agent turn")?;
            Ok(EXIT_OK)
        }
        Mode::Rpc => {
            let rpc_cfg = RpcConfig {
                model,
                provider_label,
                provider,
                store,
                session_dir,
                no_session: false,
                system_prompt: Some(system_prompt),
                time,
                compactor,
                compact_every: 20,
                retry_policy,
            };
            let mut rpc = RpcLoop::new(rpc_cfg).context("starting rpc loop")?;
            run_rpc_stdio(&mut rpc).await?;
            Ok(EXIT_OK)
        }
        Mode::Tui | Mode::Interactive => {
            let tui_cfg = pz_tui::InteractiveConfig {
                model,
                provider_label,
                provider,
                store,
                registry,
                sid,
                session_dir,
                system_prompt: Some(system_prompt),
                time,
                compactor,
                compact_every: 20,
                retry_policy,
            };
            pz_tui::run_stdio(tui_cfg).await.context("running interactive loop")?;
            Ok(EXIT_OK)
        }
    }
}

/// `--no-session` runs exactly as above but with no store, no compaction,
/// and a session id that exists only for the duration of one run (spec §8
/// E5: the session directory stays empty).
#[allow(clippy::too_many_arguments)]
async fn run_no_session(
    cli: Cli,
    model: String,
    provider_label: String,
    provider: Arc<dyn pz_provider::Transport>,
    registry: Arc<ToolRegistry>,
    session_dir: PathBuf,
    system_prompt: String,
    provider_opts: serde_json::Value,
    max_turns: u32,
    time: Arc<dyn pz_events::TimeSource>,
    retry_policy: pz_provider::RetryPolicy,
    verbose: bool,
) -> anyhow::Result<u8> {
    let memory_dir = tempfile_like_dir()?;
    let store = Arc::new(SessionStore::open(&memory_dir).context("opening ephemeral session store")?);
    let sid = pz_store::resolve(&SessionSelector::Auto, &store, time.as_ref())?;

    match cli.mode.clone().unwrap_or(Mode::Tui) {
        Mode::Print { prompt, prompt_flag } => {
            let Some(text) = prompt.or(prompt_flag) else {
                eprintln!("pz: error: print mode requires a prompt");
                return Ok(EXIT_USAGE);
            };
            let mut sink = PrintSink::new(io::stdout(), verbose);
            let run_cfg = RunConfig {
                sid,
                prompt: text,
                model,
                provider_label,
                provider,
                store,
                registry,
                sink: &mut sink,
                system_prompt: Some(system_prompt),
                provider_opts: provider_opts.clone(),
                max_turns,
                cancel: pz_core::CancelSource::new(),
                time,
                compactor: None,
                compact_every: 0,
                retry_policy,
                ask_hook: None,
            };
            Agent::run(run_cfg).await.context("running agent turn")?;
            println!();
            Ok(stop_exit_code(sink.last_stop))
        }
        Mode::Json { prompt } => {
            let mut sink = JsonlSink::new(io::stdout());
            let run_cfg = RunConfig {
                sid,
                prompt,
                model,
                provider_label,
                provider,
                store,
                registry,
                sink: &mut sink,
                system_prompt: Some(system_prompt),
                provider_opts: provider_opts.clone(),
                max_turns,
                cancel: pz_core::CancelSource::new(),
                time,
                compactor: None,
                compact_every: 0,
                retry_policy,
                ask_hook: None,
            };
            Agent::run(run_cfg).await.context("running agent turn")?;
            Ok(EXIT_OK)
        }
        Mode::Rpc => {
            let rpc_cfg = RpcConfig {
                model,
                provider_label,
                provider,
                store,
                session_dir,
                no_session: true,
                system_prompt: Some(system_prompt),
                time,
                compactor: None,
                compact_every: 0,
                retry_policy,
            };
            let mut rpc = RpcLoop::new(rpc_cfg).context("starting rpc loop")?;
            run_rpc_stdio(&mut rpc).await?;
            Ok(EXIT_OK)
        }
        Mode::Tui | Mode::Interactive => {
            let tui_cfg = pz_tui::InteractiveConfig {
                model,
                provider_label,
                provider,
                store,
                registry,
                sid,
                session_dir,
                system_prompt: Some(system_prompt),
                time,
                compactor: None,
                compact_every: 0,
                retry_policy,
            };
            pz_tui::run_stdio(tui_cfg).await.context("running interactive loop")?;
            Ok(EXIT_OK)
        }
    }
}

/// A process-unique scratch directory for `--no-session`: the store API
/// requires a directory, but nothing under it is ever meant to persist or
/// be discoverable by a later `--continue`, so it lives under the system
/// temp root rather than the configured session directory.
fn tempfile_like_dir() -> anyhow::Result<PathBuf> {
    let mut dir = std::env::temp_dir();
    dir.push(format!("pz-no-session-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn resolve_selector(cli: &Cli) -> SessionSelector {
    if let Some(target) = &cli.session {
        let path = PathBuf::from(target);
        return if path.components().count() > 1 || target.ends_with(".jsonl") {
            SessionSelector::Explicit(SelectorTarget::Path(path))
        } else {
            SessionSelector::Explicit(SelectorTarget::Id(target.clone()))
        };
    }
    if cli.wants_continue_or_resume() {
        return SessionSelector::Continue;
    }
    SessionSelector::Auto
}

fn parse_tool_mask(spec: Option<&str>) -> Result<u8, String> {
    match spec {
        None => Ok(MASK_ALL),
        Some("all") => Ok(MASK_ALL),
        Some("none") => Ok(MASK_NONE),
        Some(csv) => {
            let mut mask = MASK_NONE;
            for name in csv.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                match ToolKind::from_str(name) {
                    Some(kind) => mask |= kind.mask(),
                    None => return Err(name.to_string()),
                }
            }
            Ok(mask)
        }
    }
}

fn stop_exit_code(stop: Option<StopReason>) -> u8 {
    match stop {
        Some(StopReason::Done) | Some(StopReason::MaxOut) | Some(StopReason::Tool) | None => EXIT_OK,
        Some(StopReason::Canceled) | Some(StopReason::Err) => EXIT_RUNTIME,
    }
}

async fn run_rpc_stdio(rpc: &mut RpcLoop) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut stdout = io::stdout();
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !rpc.handle_line(trimmed, &mut stdout).await {
            break;
        }
    }
    Ok(())
}
