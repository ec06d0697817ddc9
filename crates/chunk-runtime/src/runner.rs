// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The chunked runner with a type-state enforced setup.
//!
//! ```text
//! ChunkedRunner<Idle>
//!     │  .setup(device, units)
//!     ▼
//! ChunkedRunner<Ready>
//!     │  .run(step, inputs, cancel)
//!     ▼
//!   RunOutput
//! ```
//!
//! A run splits the conditioning sequence into chunks of `chunk_length`
//! rows. Chunk 0 is fed copies of the reference frame as its prior
//! window; every later chunk is fed the rescaled tail of the one before.
//! Chunks are produced strictly in order, each one wrapped in the
//! exactly-once exhaustion retry, with reclamation sweeps on both sides.

use crate::retry::run_with_retry_traced;
use crate::window::{conditioning_range, initial_window, steady_window};
use crate::{ChunkMetrics, ChunkRequest, ChunkStep, Frame, RunConfig, RunMetrics, RuntimeError, StepError};
use memory_manager::{FastMemory, MemoryManager, OffloadOutcome, UnitHandle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

// ── Type-state markers ─────────────────────────────────────────

/// Runner is configured but owns no units.
#[derive(Debug)]
pub struct Idle;

/// Units are registered and the initial placement is settled.
pub struct Ready {
    manager: MemoryManager,
}

impl std::fmt::Debug for Ready {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ready")
            .field("units", &self.manager.registry().len())
            .finish()
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Idle {}
    impl Sealed for super::Ready {}
}

/// Runner states. Sealed: only [`Idle`] and [`Ready`] implement it.
///
/// ```compile_fail
/// #[derive(Debug)]
/// struct Draining;
/// impl chunk_runtime::RunnerState for Draining {}
/// ```
pub trait RunnerState: sealed::Sealed + std::fmt::Debug {}
impl RunnerState for Idle {}
impl RunnerState for Ready {}

// ── Inputs and outputs ─────────────────────────────────────────

/// Per-run inputs.
#[derive(Debug, Clone)]
pub struct ChunkInputs {
    /// The seed input, in the `[-1, 1]` input convention.
    pub reference: Frame,
    /// One conditioning row per target frame. Its length decides the
    /// number of chunks: `len / chunk_length`.
    pub conditioning: Vec<Vec<f32>>,
    /// Frames to keep. Output is trimmed to this, never padded.
    pub total_length: usize,
}

/// The result of a completed run.
#[derive(Debug)]
pub struct RunOutput {
    /// Frames of all chunks in chunk order, trimmed to `total_length`.
    pub frames: Vec<Frame>,
    pub metrics: RunMetrics,
}

/// Cooperative cancellation observed at chunk boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ── Runner ─────────────────────────────────────────────────────

/// Drives a [`ChunkStep`] over a conditioning sequence.
///
/// # Example
/// ```no_run
/// use chunk_runtime::{CancelFlag, ChunkInputs, ChunkStep, ChunkedRunner, RunConfig};
/// use memory_manager::{ByteSize, SimulatedDevice};
/// use std::sync::Arc;
///
/// # fn example(step: &mut dyn ChunkStep, inputs: ChunkInputs) -> Result<(), chunk_runtime::RuntimeError> {
/// let device = SimulatedDevice::new(ByteSize::from_gb(16.0));
/// let mut runner = ChunkedRunner::new(RunConfig::default())
///     .setup(Arc::new(device), Vec::new())?;
/// let output = runner.run(step, &inputs, &CancelFlag::new())?;
/// println!("{}", output.metrics.summary());
/// # Ok(())
/// # }
/// ```
pub struct ChunkedRunner<S: RunnerState = Idle> {
    config: RunConfig,
    state: S,
}

impl<S: RunnerState> ChunkedRunner<S> {
    pub fn config(&self) -> &RunConfig {
        &self.config
    }
}

// ── Idle → Ready ───────────────────────────────────────────────

impl ChunkedRunner<Idle> {
    pub fn new(config: RunConfig) -> Self {
        tracing::info!(
            "runner created: chunk_length={}, window_size={}, offload={}",
            config.chunk_length,
            config.window_size,
            config.enable_offload,
        );
        Self { config, state: Idle }
    }

    /// Registers `units` with a fresh [`MemoryManager`] over `device` and
    /// applies the placement policy once.
    pub fn setup(
        self,
        device: Arc<dyn FastMemory>,
        units: Vec<(String, Box<dyn UnitHandle>)>,
    ) -> Result<ChunkedRunner<Ready>, RuntimeError> {
        self.config.validate()?;
        let mut manager = MemoryManager::new(device, self.config.offload_config()?);
        for (name, handle) in units {
            manager.register(name, handle);
        }

        match manager.auto_offload_if_needed()? {
            OffloadOutcome::PolicyExhausted {
                evicted,
                usage_bytes,
            } => tracing::warn!(
                "fast memory still at {:.2} GB after evicting {} units",
                usage_bytes as f64 / GIB,
                evicted.len()
            ),
            outcome => tracing::debug!("initial placement settled: {outcome:?}"),
        }
        manager.stats().log();

        Ok(self.with_manager(manager))
    }

    /// Skips registration and uses an already populated manager.
    pub fn with_manager(self, manager: MemoryManager) -> ChunkedRunner<Ready> {
        ChunkedRunner {
            config: self.config,
            state: Ready { manager },
        }
    }
}

// ── Ready: run ─────────────────────────────────────────────────

impl ChunkedRunner<Ready> {
    pub fn manager(&self) -> &MemoryManager {
        &self.state.manager
    }

    pub fn manager_mut(&mut self) -> &mut MemoryManager {
        &mut self.state.manager
    }

    /// Produces every chunk in order and assembles the trimmed output.
    ///
    /// Any chunk failure aborts the run; frames from earlier chunks are
    /// discarded. The generator is seeded once per run and threaded
    /// through all chunks; a retried attempt starts from the same
    /// generator state as the failed one.
    pub fn run<S: ChunkStep + ?Sized>(
        &mut self,
        step: &mut S,
        inputs: &ChunkInputs,
        cancel: &CancelFlag,
    ) -> Result<RunOutput, RuntimeError> {
        let run_start = Instant::now();
        let chunk_length = self.config.chunk_length;
        let num_chunks = inputs.conditioning.len() / chunk_length;
        if num_chunks == 0 {
            return Err(RuntimeError::InvalidInput(format!(
                "{} conditioning rows cannot fill a chunk of {}",
                inputs.conditioning.len(),
                chunk_length
            )));
        }

        let device = self.state.manager.registry().device();
        let mut generator = StdRng::seed_from_u64(self.config.seed);
        let mut metrics = RunMetrics::new(num_chunks);
        let mut chunks: Vec<Vec<Frame>> = Vec::with_capacity(num_chunks);

        tracing::debug!(
            "starting run: {} conditioning rows, {} chunks, target {} frames",
            inputs.conditioning.len(),
            num_chunks,
            inputs.total_length,
        );

        for index in 0..num_chunks {
            if cancel.is_cancelled() {
                tracing::warn!("run cancelled before chunk {}/{}", index + 1, num_chunks);
                return Err(RuntimeError::Cancelled { completed: index });
            }

            let window = match chunks.last() {
                None => initial_window(&inputs.reference, self.config.init_window_copies),
                Some(previous) => steady_window(previous, self.config.window_size),
            };
            let rows = conditioning_range(index, chunk_length, inputs.conditioning.len());
            let request = ChunkRequest {
                index,
                reference: inputs.reference.clone(),
                window,
                conditioning: inputs.conditioning[rows].to_vec(),
                target_length: chunk_length,
                inference_steps: self.config.inference_steps,
                guidance_scale: self.config.guidance_scale,
                is_new_sequence: index == 0,
            };

            self.state.manager.reclaim();
            self.state
                .manager
                .auto_offload_if_needed()
                .map_err(|e| RuntimeError::ChunkFailed {
                    index,
                    total: num_chunks,
                    source: StepError::Memory(e),
                })?;
            let usage_before = self.state.manager.current_usage();
            tracing::info!(
                "processing chunk {}/{}, fast memory: {:.2} GB",
                index + 1,
                num_chunks,
                usage_before as f64 / GIB,
            );

            let chunk_start = Instant::now();
            let snapshot = generator.clone();
            let manager = &mut self.state.manager;
            let attempt = run_with_retry_traced(device.as_ref(), || {
                let mut rng = snapshot.clone();
                step.generate(&mut *manager, &request, &mut rng)
                    .map(|output| (output, rng))
            })
            .map_err(|source| {
                tracing::error!("chunk {}/{} failed: {source}", index + 1, num_chunks);
                RuntimeError::ChunkFailed {
                    index,
                    total: num_chunks,
                    source,
                }
            })?;
            let retried = attempt.retried;
            let (output, advanced) = attempt.value;
            generator = advanced;

            self.state.manager.reclaim();
            let usage_after = self.state.manager.current_usage();
            tracing::debug!(
                "chunk {} produced {} frames, fast memory after sweep: {:.2} GB",
                index,
                output.frames.len(),
                usage_after as f64 / GIB,
            );

            metrics.record_chunk(ChunkMetrics {
                index,
                duration: chunk_start.elapsed(),
                usage_before_bytes: usage_before,
                usage_after_bytes: usage_after,
                frames: output.frames.len(),
                retried,
            });
            chunks.push(output.frames);
        }

        let mut frames: Vec<Frame> = chunks.into_iter().flatten().collect();
        let produced = frames.len();
        frames.truncate(inputs.total_length);

        metrics.finalise(run_start.elapsed(), produced, frames.len());
        tracing::info!("{}", metrics.summary());

        Ok(RunOutput { frames, metrics })
    }
}

impl<S: RunnerState> std::fmt::Debug for ChunkedRunner<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedRunner")
            .field("state", &self.state)
            .field("chunk_length", &self.config.chunk_length)
            .field("window_size", &self.config.window_size)
            .finish()
    }
}
