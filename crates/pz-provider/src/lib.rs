// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod mock;
mod native;
mod process;
mod registry;
mod retry;
mod stub;
mod transport;
mod types;

pub use mock::{MockTransport, ScriptedMockTransport};
pub use native::{load_auth, AuthCreds, NativeTransport};
pub use process::ProcessTransport;
pub use registry::resolve_transport;
pub use retry::{retry, RetryPolicy, TransportError};
pub use stub::MissingProviderTransport;
pub use transport::{ProviderStream, Transport};
pub use types::{Msg, MsgPart, Req, ReqOpts, Role, ToolSpec};
pub use pz_events::{ProviderEvent, StopReason, UsageTotals};
