// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Merged configuration for one run, after layering `~/.pi/agent/settings.json`,
/// `./.pz.json`, an explicit `-C/--config` file, and environment overrides
/// (spec §6 "Precedence"). CLI flags are applied by the caller on top of the
/// value this crate returns — every field here is optional so "unset" and
/// "explicitly false/empty" remain distinguishable while merging layers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub model: Option<String>,
    pub provider: Option<String>,
    pub provider_cmd: Option<String>,
    pub session_dir: Option<PathBuf>,
    #[serde(default)]
    pub tools: Option<ToolsSpec>,
    #[serde(default)]
    pub thinking: Option<ThinkingLevel>,
    pub max_turns: Option<u32>,
    pub system_prompt: Option<String>,
    pub append_system_prompt: Option<String>,
    #[serde(default)]
    pub verbose: bool,
}

impl Config {
    /// Overwrite every field set in `other`, leaving fields `other` leaves
    /// unset untouched. Used to apply one config layer on top of another,
    /// with the later layer's fields winning field-by-field rather than
    /// replacing the whole struct.
    pub fn merge(mut self, other: Config) -> Config {
        if other.model.is_some() {
            self.model = other.model;
        }
        if other.provider.is_some() {
            self.provider = other.provider;
        }
        if other.provider_cmd.is_some() {
            self.provider_cmd = other.provider_cmd;
        }
        if other.session_dir.is_some() {
            self.session_dir = other.session_dir;
        }
        if other.tools.is_some() {
            self.tools = other.tools;
        }
        if other.thinking.is_some() {
            self.thinking = other.thinking;
        }
        if other.max_turns.is_some() {
            self.max_turns = other.max_turns;
        }
        if other.system_prompt.is_some() {
            self.system_prompt = other.system_prompt;
        }
        if other.append_system_prompt.is_some() {
            self.append_system_prompt = other.append_system_prompt;
        }
        self.verbose = self.verbose || other.verbose;
        self
    }
}

/// `--tools <csv|all|none>` selector, resolved against the closed tool kind
/// set by the caller (`pz-tools` owns the actual kind list).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ToolsSpec {
    All,
    None,
    Csv(String),
}

/// Reasoning effort requested from providers that support it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[clap(rename_all = "kebab-case")]
pub enum ThinkingLevel {
    #[default]
    Off,
    Min,
    Low,
    Med,
    High,
    Xhigh,
    Adaptive,
}


impl ToolsSpec {
    /// Canonicalise the bare strings `"all"`/`"none"` to the typed variants;
    /// anything else stays a csv list of tool names.
    pub fn normalize(self) -> ToolsSpec {
        match self {
            ToolsSpec::Csv(s) if s == "all" => ToolsSpec::All,
            ToolsSpec::Csv(s) if s == "none" => ToolsSpec::None,
            other => other,
        }
    }
}
