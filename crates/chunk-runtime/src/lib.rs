// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # chunk-runtime
//!
//! Chunked, windowed generation on top of `memory-manager`.
//!
//! The runtime takes:
//! - A [`RunConfig`] (TOML or programmatic).
//! - A fast-memory device and the named units to place on it.
//! - A [`ChunkStep`] that produces one chunk of frames.
//!
//! And drives the step over a conditioning sequence chunk by chunk,
//! carrying a window of trailing frames from each chunk into the next,
//! sweeping the device between chunks and retrying a chunk once when it
//! runs out of fast memory.
//!
//! # Type-State Pipeline
//! ```text
//! ChunkedRunner<Idle> → ChunkedRunner<Ready>
//! ```
//! Only a `Ready` runner can run.

mod config;
mod error;
mod metrics;
pub mod retry;
mod runner;
mod step;
pub mod window;

pub use config::RunConfig;
pub use error::{RuntimeError, StepError};
pub use metrics::{ChunkMetrics, RunMetrics};
pub use retry::{run_with_retry, Recoverable};
pub use runner::{CancelFlag, ChunkInputs, ChunkedRunner, Idle, Ready, RunOutput, RunnerState};
pub use step::{ChunkOutput, ChunkRequest, ChunkStep, Frame};

pub use rand::rngs::StdRng;
