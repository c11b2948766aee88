// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Thinking {
    Off,
    Min,
    Low,
    #[default]
    Med,
    High,
    Xhigh,
    Adaptive,
}

impl Thinking {
    pub fn as_str(self) -> &'static str {
        match self {
            Thinking::Off => "off",
            Thinking::Min => "min",
            Thinking::Low => "low",
            Thinking::Med => "med",
            Thinking::High => "high",
            Thinking::Xhigh => "xhigh",
            Thinking::Adaptive => "adaptive",
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Mode {
    /// Default interactive UI (spec §6).
    Tui,
    /// Alias of `tui`.
    Interactive,
    /// Headless: emits only assistant text to stdout.
    Print {
        /// The prompt, given positionally or via `--prompt`.
        #[arg(value_name = "PROMPT")]
        prompt: Option<String>,
        #[arg(long)]
        prompt_flag: Option<String>,
    },
    /// JSONL events to stdout.
    Json {
        #[arg(value_name = "PROMPT")]
        prompt: String,
    },
    /// JSON-RPC envelopes over stdin/stdout.
    Rpc,
}

#[derive(Parser, Debug)]
#[command(name = "pz", about = "An interactive CLI agent", version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub mode: Option<Mode>,

    /// Model to use.
    #[arg(long, env = "PZ_MODEL")]
    pub model: Option<String>,

    /// Provider label attached to requests (does not select the transport).
    #[arg(long, env = "PZ_PROVIDER")]
    pub provider: Option<String>,

    /// External command used as the provider transport (spec §4.3 process transport).
    #[arg(long)]
    pub provider_cmd: Option<String>,

    /// Session log directory (default `./.pz/sessions`).
    #[arg(long)]
    pub session_dir: Option<PathBuf>,

    /// Resume a specific session by id or log path.
    #[arg(long, value_name = "ID|PATH")]
    pub session: Option<String>,

    /// Continue the most recently modified session in the directory.
    #[arg(short = 'c', long = "continue")]
    pub continue_: bool,

    /// Same as `--continue` (spec names both `-c/--continue` and `-r/--resume`
    /// for the "most recent session" selector).
    #[arg(short = 'r', long)]
    pub resume: bool,

    /// Don't read or write any session log.
    #[arg(long)]
    pub no_session: bool,

    /// Enabled tool kinds: csv of `read,write,bash,edit,grep,find,ls,ask`,
    /// or `all`, or `none`.
    #[arg(long)]
    pub tools: Option<String>,

    /// Shorthand for `--tools none`.
    #[arg(long)]
    pub no_tools: bool,

    #[arg(long, value_enum, default_value = "med")]
    pub thinking: Thinking,

    /// `0` means unlimited.
    #[arg(long, default_value = "0")]
    pub max_turns: u32,

    /// Replace the default system prompt entirely.
    #[arg(long, value_name = "TEXT")]
    pub system_prompt: Option<String>,

    /// Append text after the active system prompt.
    #[arg(long, value_name = "TEXT")]
    pub append_system_prompt: Option<String>,

    /// Path to a project config file (overrides `./.pz.json` auto-discovery).
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Skip all config file loading; use built-in defaults plus CLI/env.
    #[arg(long)]
    pub no_config: bool,

    #[arg(long)]
    pub verbose: bool,
}

impl Cli {
    pub fn tool_mask(&self) -> Option<&str> {
        if self.no_tools {
            Some("none")
        } else {
            self.tools.as_deref()
        }
    }

    pub fn wants_continue_or_resume(&self) -> bool {
        self.continue_ || self.resume
    }
}
