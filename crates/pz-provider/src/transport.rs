// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use pz_events::ProviderEvent;

use crate::retry::TransportError;
use crate::types::Req;

/// A lazy sequence of [`ProviderEvent`]s for one model turn (spec §4.3).
pub type ProviderStream = Pin<Box<dyn Stream<Item = ProviderEvent> + Send>>;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Start a turn. Returns `Err` only for failures before any event could
    /// be produced (e.g. the process failed to spawn, the connection could
    /// not be opened); classified so the retry wrapper can decide whether to
    /// retry. Once a stream is returned, transport-level failures mid-stream
    /// are represented as an `err` event followed by `stop{err}`.
    async fn start(&self, req: Req) -> Result<ProviderStream, TransportError>;
}
