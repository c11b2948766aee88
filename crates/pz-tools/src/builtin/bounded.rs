// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use pz_events::{OutputChunk, OutputStream, TruncationMeta};

/// Accumulates chunks for one tool call with a strictly increasing `seq`
/// (spec §8 invariant 4), truncating each stream independently at
/// `limit_bytes` and appending a `meta` chunk when truncation occurred.
pub(crate) struct ChunkBuilder {
    call_id: String,
    at_ms: i64,
    limit_bytes: usize,
    seq: u64,
    chunks: Vec<OutputChunk>,
}

impl ChunkBuilder {
    pub(crate) fn new(call_id: impl Into<String>, at_ms: i64, limit_bytes: usize) -> Self {
        Self {
            call_id: call_id.into(),
            at_ms,
            limit_bytes,
            seq: 0,
            chunks: Vec::new(),
        }
    }

    /// Push `text` on `stream`, keeping only the first `limit_bytes` bytes
    /// and recording a `meta` chunk for the caller to decide whether to
    /// append (most handlers always do).
    pub(crate) fn push(&mut self, stream: OutputStream, text: &str) -> Option<TruncationMeta> {
        let full_bytes = text.len();
        let (kept, truncated) = if full_bytes > self.limit_bytes {
            let mut end = self.limit_bytes;
            while end > 0 && !text.is_char_boundary(end) {
                end -= 1;
            }
            (&text[..end], true)
        } else {
            (text, false)
        };
        let kept_bytes = kept.len();
        self.chunks.push(OutputChunk::text(
            self.call_id.clone(),
            self.seq,
            self.at_ms,
            stream,
            kept,
            truncated,
        ));
        self.seq += 1;
        if truncated {
            Some(TruncationMeta::new(stream, self.limit_bytes, full_bytes, kept_bytes))
        } else {
            None
        }
    }

    pub(crate) fn push_meta(&mut self, meta: &TruncationMeta) {
        self.chunks.push(OutputChunk::meta(self.call_id.clone(), self.seq, self.at_ms, meta));
        self.seq += 1;
    }

    pub(crate) fn finish(self) -> Vec<OutputChunk> {
        self.chunks
    }
}
