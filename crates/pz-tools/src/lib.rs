// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod builtin;
pub mod registry;
pub mod tool;

pub use builtin::ask::AskHandler;
pub use builtin::bash::BashHandler;
pub use builtin::edit::EditHandler;
pub use builtin::find::FindHandler;
pub use builtin::grep::GrepHandler;
pub use builtin::ls::LsHandler;
pub use builtin::read::ReadHandler;
pub use builtin::write::WriteHandler;

pub use registry::{is_err, ToolRegistry, ToolSpec};
pub use tool::{AskHook, HandlerCtx, HandlerOutput, ToolCall, ToolHandler};
