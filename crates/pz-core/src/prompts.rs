// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! System prompt assembly for `--system-prompt` / `--append-system-prompt`
//! (spec §6). No project discovery, no skills/subagent inventory: the
//! default is a static block of operating guidelines, optionally replaced
//! wholesale or extended.

fn build_guidelines_section() -> String {
    "## Guidelines\n\n\
     - Prefer small, verifiable steps over large speculative ones.\n\
     - Use the available tools to inspect real state before acting on it.\n\
     - Report tool failures plainly; do not paper over an error result.\n"
        .to_string()
}

/// Build the active system prompt text.
///
/// - `override_prompt` (`--system-prompt`) replaces the default guidelines
///   entirely.
/// - `append_prompt` (`--append-system-prompt`) is appended verbatim after
///   whichever of the above applies.
pub fn system_prompt(override_prompt: Option<&str>, append_prompt: Option<&str>) -> String {
    let mut out = match override_prompt {
        Some(custom) => custom.to_string(),
        None => build_guidelines_section(),
    };
    if let Some(extra) = append_prompt {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(extra);
    }
    out
}
