// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Run profiling metrics.
//!
//! [`RunMetrics`] collects per-chunk timing and fast-memory usage along
//! with retry counts for a whole run.

use std::time::Duration;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Metrics for one chunk.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChunkMetrics {
    pub index: usize,
    /// Wall-clock time across all attempts.
    pub duration: Duration,
    /// Fast-memory usage after the pre-chunk sweep.
    pub usage_before_bytes: usize,
    /// Fast-memory usage after the post-chunk sweep.
    pub usage_after_bytes: usize,
    pub frames: usize,
    /// Whether the exhaustion retry was needed.
    pub retried: bool,
}

/// Aggregate metrics for a complete run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunMetrics {
    pub total_duration: Duration,
    /// Chunks planned for the run.
    pub num_chunks: usize,
    pub chunks: Vec<ChunkMetrics>,
    /// Highest usage observed at any chunk boundary.
    pub peak_usage_bytes: usize,
    pub retries: usize,
    /// Frames produced by all chunks before trimming.
    pub frames_produced: usize,
    /// Frames in the returned output.
    pub frames_returned: usize,
}

impl RunMetrics {
    pub fn new(num_chunks: usize) -> Self {
        Self {
            total_duration: Duration::ZERO,
            num_chunks,
            chunks: Vec::with_capacity(num_chunks),
            peak_usage_bytes: 0,
            retries: 0,
            frames_produced: 0,
            frames_returned: 0,
        }
    }

    pub fn record_chunk(&mut self, chunk: ChunkMetrics) {
        self.peak_usage_bytes = self
            .peak_usage_bytes
            .max(chunk.usage_before_bytes)
            .max(chunk.usage_after_bytes);
        if chunk.retried {
            self.retries += 1;
        }
        self.chunks.push(chunk);
    }

    /// Finalises metrics with the wall-clock time and frame counts.
    pub fn finalise(&mut self, total: Duration, produced: usize, returned: usize) {
        self.total_duration = total;
        self.frames_produced = produced;
        self.frames_returned = returned;
    }

    pub fn frames_per_second(&self) -> f64 {
        let secs = self.total_duration.as_secs_f64();
        if secs <= 0.0 || self.frames_returned == 0 {
            return 0.0;
        }
        self.frames_returned as f64 / secs
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        format!(
            "Run: {:.2}ms total, {}/{} chunks, {} retries, {} frames ({} produced, {:.1} frames/s), \
             peak fast memory {:.2} GB",
            self.total_duration.as_secs_f64() * 1000.0,
            self.chunks.len(),
            self.num_chunks,
            self.retries,
            self.frames_returned,
            self.frames_produced,
            self.frames_per_second(),
            self.peak_usage_bytes as f64 / GIB,
        )
    }
}
