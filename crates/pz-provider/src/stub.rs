// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use futures::stream;
use pz_events::{ProviderEvent, StopReason};

use crate::retry::TransportError;
use crate::transport::{ProviderStream, Transport};
use crate::types::Req;

/// Lowest-precedence fallback when no transport command was given and no
/// native credentials are configured (spec §4.3): "yields a single `err` +
/// `stop{err}`".
pub struct MissingProviderTransport;

#[async_trait]
impl Transport for MissingProviderTransport {
    async fn start(&self, _req: Req) -> Result<ProviderStream, TransportError> {
        let events = vec![
            ProviderEvent::Err("no provider configured: set --provider-cmd or provider credentials".into()),
            ProviderEvent::Stop(StopReason::Err),
        ];
        Ok(Box::pin(stream::iter(events)))
    }
}
