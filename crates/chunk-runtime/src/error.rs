// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the chunk runtime.

use memory_manager::MemoryError;

/// Errors raised by a [`ChunkStep`](crate::ChunkStep).
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// A placement or allocation failure, possibly exhaustion.
    #[error(transparent)]
    Memory(#[from] MemoryError),

    /// The computation itself failed.
    #[error("computation failed: {0}")]
    Computation(String),
}

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Memory setup failed before the first chunk.
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    /// The run inputs cannot produce a single chunk.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A chunk failed after any allowed retry; the run is discarded.
    #[error("chunk {index} of {total} failed: {source}")]
    ChunkFailed {
        index: usize,
        total: usize,
        #[source]
        source: StepError,
    },

    /// Cancellation was observed at a chunk boundary.
    #[error("run cancelled after {completed} chunks")]
    Cancelled { completed: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_failure_names_index_and_cause() {
        let e = RuntimeError::ChunkFailed {
            index: 3,
            total: 9,
            source: StepError::Computation("NaN in latents".into()),
        };
        assert_eq!(
            e.to_string(),
            "chunk 3 of 9 failed: computation failed: NaN in latents"
        );
    }

    #[test]
    fn test_memory_error_is_transparent() {
        let e = StepError::from(MemoryError::UnregisteredUnit("vae".into()));
        assert_eq!(e.to_string(), "unit 'vae' is not registered");
    }
}
