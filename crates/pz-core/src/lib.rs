// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod agent;
mod cancel;
mod compact;
mod history;
mod prompts;
mod rpc;
mod sink;

pub use agent::{Agent, RunConfig};
pub use cancel::CancelSource;
pub use compact::{Compactor, StoreCompactor};
pub use history::fold_event;
pub use prompts::system_prompt;
pub use rpc::{RpcConfig, RpcLoop};
pub use sink::{mode_event_to_json, provider_event_to_json, JsonlSink, PrintSink, RecordingSink, ModeSink};
