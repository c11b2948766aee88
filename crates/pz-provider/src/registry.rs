// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use crate::native::NativeTransport;
use crate::process::ProcessTransport;
use crate::stub::MissingProviderTransport;
use crate::transport::Transport;

/// Selection precedence (spec §4.3): explicit transport command > native >
/// missing-provider stub.
pub fn resolve_transport(provider_cmd: Option<&str>) -> Arc<dyn Transport> {
    if let Some(cmd) = provider_cmd {
        return Arc::new(ProcessTransport::new(cmd));
    }
    if let Some(native) = NativeTransport::from_env() {
        return Arc::new(native);
    }
    Arc::new(MissingProviderTransport)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_cmd_takes_precedence() {
        std::env::remove_var("ANTHROPIC_API_KEY");
        std::env::remove_var("ANTHROPIC_OAUTH_TOKEN");
        let _transport = resolve_transport(Some("echo hi"));
    }

    #[test]
    fn falls_back_to_stub_without_cmd_or_credentials() {
        std::env::remove_var("ANTHROPIC_API_KEY");
        std::env::remove_var("ANTHROPIC_OAUTH_TOKEN");
        let _transport = resolve_transport(None);
    }
}
