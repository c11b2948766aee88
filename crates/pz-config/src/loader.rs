// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::Config;

/// Upstream settings file shared with other `.pi` tooling, lowest-priority
/// file layer (spec §6 "Persisted state layout").
fn upstream_settings_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".pi/agent/settings.json"))
}

/// Project-local config file, overrides the upstream settings file.
fn project_config_path() -> PathBuf {
    PathBuf::from("./.pz.json")
}

/// Load and merge the file layers named in spec §6: upstream settings file,
/// then project config file, then (if given) an explicit `-C/--config`
/// override. Environment and CLI layers are applied by the caller on top of
/// the returned [`Config`] since they don't come from files.
///
/// `--no-config` should be handled by the caller skipping this call
/// entirely and using `Config::default()`.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();

    if let Some(path) = upstream_settings_path() {
        if path.is_file() {
            config = config.merge(read_layer(&path)?);
        }
    }

    let project = project_config_path();
    if project.is_file() {
        config = config.merge(read_layer(&project)?);
    }

    if let Some(path) = explicit {
        config = config.merge(read_layer(path)?);
    }

    Ok(config)
}

fn read_layer(path: &Path) -> anyhow::Result<Config> {
    debug!(path = %path.display(), "loading config layer");
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
}

/// Overlay environment variables onto `config` (spec §6 precedence:
/// "environment" ranks above both config files and below CLI flags).
pub fn apply_env(mut config: Config) -> Config {
    if let Ok(v) = std::env::var("PZ_MODEL") {
        config.model = Some(v);
    }
    if let Ok(v) = std::env::var("PZ_PROVIDER") {
        config.provider = Some(v);
    }
    if let Ok(v) = std::env::var("PZ_PROVIDER_CMD") {
        config.provider_cmd = Some(v);
    }
    if let Ok(v) = std::env::var("PZ_SESSION_DIR") {
        config.session_dir = Some(PathBuf::from(v));
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_with_no_files_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prev = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        let cfg = load(None).unwrap();
        std::env::set_current_dir(prev).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn load_explicit_file_overrides_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, r#"{{"model":"claude-opus","provider":"anthropic"}}"#).unwrap();
        let cfg = load(Some(f.path())).unwrap();
        assert_eq!(cfg.model.as_deref(), Some("claude-opus"));
        assert_eq!(cfg.provider.as_deref(), Some("anthropic"));
    }

    #[test]
    fn load_returns_error_on_malformed_explicit_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "not json").unwrap();
        assert!(load(Some(f.path())).is_err());
    }

    #[test]
    fn project_file_overrides_upstream_layer_field_by_field() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".pz.json"),
            r#"{"provider":"openai","max_turns":3}"#,
        )
        .unwrap();
        let prev = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        let cfg = load(None).unwrap();
        std::env::set_current_dir(prev).unwrap();
        assert_eq!(cfg.provider.as_deref(), Some("openai"));
        assert_eq!(cfg.max_turns, Some(3));
    }

    #[test]
    fn env_overlay_wins_over_file_layers() {
        std::env::set_var("PZ_MODEL", "env-model");
        let cfg = apply_env(Config {
            model: Some("file-model".into()),
            ..Default::default()
        });
        std::env::remove_var("PZ_MODEL");
        assert_eq!(cfg.model.as_deref(), Some("env-model"));
    }
}
