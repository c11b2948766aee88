// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use thiserror::Error;

/// Typed failure modes for every session-store operation (spec §4.1).
///
/// The store never panics on corruption or a bad selector; every operation
/// returns one of these instead.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    Denied(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("ambiguous session id prefix {prefix:?}: matches {matches:?}")]
    Ambiguous { prefix: String, matches: Vec<String> },

    #[error("session already exists: {0}")]
    Exists(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("out of memory budget: {0}")]
    Oom(String),
}

impl StoreError {
    /// Short machine-stable kind string, mirrored in `runtime:store:<kind>`
    /// error events the agent loop synthesizes when a store call fails.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "not_found",
            StoreError::Denied(_) => "denied",
            StoreError::InvalidPath(_) => "invalid_path",
            StoreError::Ambiguous { .. } => "ambiguous",
            StoreError::Exists(_) => "exists",
            StoreError::Io(_) => "io",
            StoreError::Oom(_) => "oom",
        }
    }
}

pub(crate) fn invalid_path(path: impl Into<PathBuf>) -> StoreError {
    StoreError::InvalidPath(path.into().display().to_string())
}
