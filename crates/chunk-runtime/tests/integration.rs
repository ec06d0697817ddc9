// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: end-to-end chunked runs.
//!
//! These tests drive complete runs through the runner, the retry wrapper
//! and the memory manager together, checking window carry-over, ordering,
//! retry and abort behaviour, and unit placement across chunks.

use chunk_runtime::{
    CancelFlag, ChunkInputs, ChunkOutput, ChunkRequest, ChunkStep, ChunkedRunner, Frame, Ready,
    RunConfig, RuntimeError, StdRng, StepError,
};
use memory_manager::{
    ByteSize, MemoryError, MemoryManager, Placement, Precision, SimulatedDevice, SimulatedUnit,
    UnitHandle,
};
use rand::Rng;
use std::sync::Arc;

const MB: usize = 1024 * 1024;

// ── Helpers ────────────────────────────────────────────────────

/// Frame `p` of chunk `t` holds `(t * 100 + p) / 1000`, so every frame in
/// a run is distinct and traceable to its origin.
fn tagged_frames(index: usize, count: usize) -> Vec<Frame> {
    (0..count)
        .map(|p| Frame::filled(1, (index * 100 + p) as f32 / 1000.0))
        .collect()
}

fn exhausted() -> StepError {
    StepError::Memory(MemoryError::ResourceExhaustion {
        requested_bytes: 4 * MB,
        available_bytes: 0,
        capacity_bytes: 16 * MB,
    })
}

/// Records every request it sees and fails the first `failures` calls
/// with exhaustion.
struct RecordingStep {
    requests: Vec<ChunkRequest>,
    draws: Vec<u64>,
    failures: usize,
}

impl RecordingStep {
    fn new() -> Self {
        Self::failing(0)
    }

    fn failing(failures: usize) -> Self {
        Self {
            requests: Vec::new(),
            draws: Vec::new(),
            failures,
        }
    }
}

impl ChunkStep for RecordingStep {
    fn generate(
        &mut self,
        _manager: &mut MemoryManager,
        request: &ChunkRequest,
        generator: &mut StdRng,
    ) -> Result<ChunkOutput, StepError> {
        self.requests.push(request.clone());
        self.draws.push(generator.gen());
        if self.failures > 0 {
            self.failures -= 1;
            return Err(exhausted());
        }
        Ok(ChunkOutput {
            frames: tagged_frames(request.index, request.target_length),
        })
    }
}

fn inputs(rows: usize, total_length: usize) -> ChunkInputs {
    ChunkInputs {
        reference: Frame::filled(1, 0.75),
        conditioning: (0..rows).map(|r| vec![r as f32]).collect(),
        total_length,
    }
}

fn windowed_config(chunk_length: usize, window_size: usize) -> RunConfig {
    RunConfig {
        chunk_length,
        window_size,
        init_window_copies: 2,
        ..Default::default()
    }
}

fn ready(config: RunConfig, device: &SimulatedDevice) -> ChunkedRunner<Ready> {
    ChunkedRunner::new(config)
        .setup(Arc::new(device.clone()), Vec::new())
        .unwrap()
}

// ── Windowing and ordering ─────────────────────────────────────

#[test]
fn test_window_carries_rescaled_tail() {
    let device = SimulatedDevice::new(ByteSize::from_mb(64));
    let mut runner = ready(windowed_config(20, 5), &device);
    let mut step = RecordingStep::new();

    let out = runner.run(&mut step, &inputs(50, 50), &CancelFlag::new()).unwrap();

    assert_eq!(step.requests.len(), 2);
    let first = &step.requests[0];
    let second = &step.requests[1];

    assert!(first.is_new_sequence);
    assert_eq!(first.window, vec![Frame::filled(1, 0.75); 2]);
    assert_eq!(first.conditioning[0], vec![0.0]);
    assert_eq!(first.conditioning.len(), 20);

    assert!(!second.is_new_sequence);
    let expected: Vec<Frame> = tagged_frames(0, 20)[15..]
        .iter()
        .map(Frame::rescaled)
        .collect();
    assert_eq!(second.window, expected);
    assert_eq!(second.conditioning[0], vec![20.0]);
    assert_eq!(second.reference, Frame::filled(1, 0.75));

    // Two chunks of 20 cover 40 frames; the output is never padded.
    assert_eq!(out.frames.len(), 40);
    assert_eq!(&out.frames[..20], &tagged_frames(0, 20)[..]);
    assert_eq!(&out.frames[20..], &tagged_frames(1, 20)[..]);
}

#[test]
fn test_padded_conditioning_is_trimmed_to_total_length() {
    let device = SimulatedDevice::new(ByteSize::from_mb(64));
    let mut runner = ready(windowed_config(20, 5), &device);
    let mut step = RecordingStep::new();

    let out = runner.run(&mut step, &inputs(60, 50), &CancelFlag::new()).unwrap();

    assert_eq!(step.requests.len(), 3);
    assert_eq!(out.frames.len(), 50);
    assert_eq!(out.frames[49], tagged_frames(2, 20)[9]);
    assert_eq!(out.metrics.frames_produced, 60);
    assert_eq!(out.metrics.frames_returned, 50);
}

#[test]
fn test_window_larger_than_chunk_uses_whole_chunk() {
    let device = SimulatedDevice::new(ByteSize::from_mb(64));
    let mut runner = ready(windowed_config(4, 16), &device);
    let mut step = RecordingStep::new();

    runner.run(&mut step, &inputs(8, 8), &CancelFlag::new()).unwrap();

    assert_eq!(step.requests[1].window.len(), 4);
}

#[test]
fn test_runs_are_deterministic_for_a_seed() {
    let device = SimulatedDevice::new(ByteSize::from_mb(64));
    let mut a = RecordingStep::new();
    let mut b = RecordingStep::new();
    ready(windowed_config(5, 2), &device)
        .run(&mut a, &inputs(15, 15), &CancelFlag::new())
        .unwrap();
    ready(windowed_config(5, 2), &device)
        .run(&mut b, &inputs(15, 15), &CancelFlag::new())
        .unwrap();

    assert_eq!(a.draws, b.draws);
    assert_eq!(a.draws.len(), 3);
    assert_ne!(a.draws[0], a.draws[1]);
}

// ── Retry and abort ────────────────────────────────────────────

#[test]
fn test_retry_sees_identical_request_and_generator() {
    let device = SimulatedDevice::new(ByteSize::from_mb(64));
    let mut runner = ready(windowed_config(4, 2), &device);
    let mut step = RecordingStep::failing(1);
    let reclaims_before = device.stats().reclaims;

    let out = runner.run(&mut step, &inputs(8, 8), &CancelFlag::new()).unwrap();

    // Chunk 0 twice, chunk 1 once.
    assert_eq!(step.requests.len(), 3);
    assert_eq!(step.requests[0], step.requests[1]);
    assert_eq!(step.draws[0], step.draws[1]);
    assert_eq!(out.metrics.retries, 1);
    assert!(out.metrics.chunks[0].retried);
    assert!(!out.metrics.chunks[1].retried);
    // Two sweeps per chunk plus the one before the retry.
    assert_eq!(device.stats().reclaims - reclaims_before, 5);
}

#[test]
fn test_retry_happens_exactly_once() {
    // Would succeed on a third attempt, which is never made.
    let device = SimulatedDevice::new(ByteSize::from_mb(64));
    let mut runner = ready(windowed_config(4, 2), &device);
    let mut step = RecordingStep::failing(2);

    let err = runner.run(&mut step, &inputs(8, 8), &CancelFlag::new()).unwrap_err();

    assert_eq!(step.requests.len(), 2);
    match err {
        RuntimeError::ChunkFailed { index, total, source } => {
            assert_eq!(index, 0);
            assert_eq!(total, 2);
            assert!(matches!(source, StepError::Memory(MemoryError::ResourceExhaustion { .. })));
        }
        other => panic!("expected ChunkFailed, got {other:?}"),
    }
}

#[test]
fn test_other_errors_abort_without_retry() {
    struct BreaksAt(usize, usize);
    impl ChunkStep for BreaksAt {
        fn generate(
            &mut self,
            _manager: &mut MemoryManager,
            request: &ChunkRequest,
            _generator: &mut StdRng,
        ) -> Result<ChunkOutput, StepError> {
            self.1 += 1;
            if request.index == self.0 {
                return Err(StepError::Computation("latents diverged".into()));
            }
            Ok(ChunkOutput {
                frames: tagged_frames(request.index, request.target_length),
            })
        }
    }

    let device = SimulatedDevice::new(ByteSize::from_mb(64));
    let mut runner = ready(windowed_config(4, 2), &device);
    let mut step = BreaksAt(1, 0);

    let err = runner.run(&mut step, &inputs(12, 12), &CancelFlag::new()).unwrap_err();

    assert_eq!(step.1, 2);
    assert_eq!(err.to_string(), "chunk 1 of 3 failed: computation failed: latents diverged");
}

#[test]
fn test_persistent_device_exhaustion_fails_chunk() {
    struct Oversized(SimulatedDevice);
    impl ChunkStep for Oversized {
        fn generate(
            &mut self,
            _manager: &mut MemoryManager,
            _request: &ChunkRequest,
            _generator: &mut StdRng,
        ) -> Result<ChunkOutput, StepError> {
            let _activations = self.0.allocate(32 * MB)?;
            Ok(ChunkOutput::default())
        }
    }

    let device = SimulatedDevice::new(ByteSize::from_mb(16));
    let mut runner = ready(windowed_config(4, 2), &device);

    let err = runner
        .run(&mut Oversized(device.clone()), &inputs(4, 4), &CancelFlag::new())
        .unwrap_err();

    assert!(matches!(err, RuntimeError::ChunkFailed { index: 0, .. }));
    assert_eq!(device.stats().oom_count, 2);
}

// ── Cancellation ───────────────────────────────────────────────

#[test]
fn test_cancel_before_first_chunk() {
    let device = SimulatedDevice::new(ByteSize::from_mb(64));
    let mut runner = ready(windowed_config(4, 2), &device);
    let mut step = RecordingStep::new();
    let cancel = CancelFlag::new();
    cancel.cancel();

    let err = runner.run(&mut step, &inputs(8, 8), &cancel).unwrap_err();

    assert!(matches!(err, RuntimeError::Cancelled { completed: 0 }));
    assert!(step.requests.is_empty());
}

#[test]
fn test_cancel_observed_at_next_boundary() {
    struct CancelsAfterFirst(CancelFlag, usize);
    impl ChunkStep for CancelsAfterFirst {
        fn generate(
            &mut self,
            _manager: &mut MemoryManager,
            request: &ChunkRequest,
            _generator: &mut StdRng,
        ) -> Result<ChunkOutput, StepError> {
            self.1 += 1;
            self.0.cancel();
            Ok(ChunkOutput {
                frames: tagged_frames(request.index, request.target_length),
            })
        }
    }

    let device = SimulatedDevice::new(ByteSize::from_mb(64));
    let mut runner = ready(windowed_config(4, 2), &device);
    let cancel = CancelFlag::new();
    let mut step = CancelsAfterFirst(cancel.clone(), 0);

    let err = runner.run(&mut step, &inputs(12, 12), &cancel).unwrap_err();

    assert!(matches!(err, RuntimeError::Cancelled { completed: 1 }));
    assert_eq!(step.1, 1);
}

// ── Scoped unit placement ──────────────────────────────────────

/// Uses both networks through `with_unit`, recording their tier while in
/// use, and allocates a transient activation buffer.
struct ScopedStep {
    device: SimulatedDevice,
    seen: Vec<(Placement, Placement)>,
}

impl ChunkStep for ScopedStep {
    fn generate(
        &mut self,
        manager: &mut MemoryManager,
        request: &ChunkRequest,
        _generator: &mut StdRng,
    ) -> Result<ChunkOutput, StepError> {
        let reference = manager.with_unit("reference_net", None, |unit| {
            Ok::<_, StepError>(unit.resident_tier())
        })?;
        let diffusion = manager.with_unit("diffusion_net", None, |unit| {
            let _activations = self.device.allocate(MB)?;
            Ok::<_, StepError>(unit.resident_tier())
        })?;
        self.seen.push((reference, diffusion));
        Ok(ChunkOutput {
            frames: tagged_frames(request.index, request.target_length),
        })
    }
}

fn networks(device: &SimulatedDevice) -> Vec<(String, Box<dyn UnitHandle>)> {
    vec![
        (
            "reference_net".to_string(),
            Box::new(SimulatedUnit::new(device.clone(), 4 * MB, Precision::F32)) as Box<dyn UnitHandle>,
        ),
        (
            "diffusion_net".to_string(),
            Box::new(SimulatedUnit::new(device.clone(), 6 * MB, Precision::F32)) as Box<dyn UnitHandle>,
        ),
    ]
}

#[test]
fn test_offloaded_units_return_to_reserve_between_chunks() {
    let device = SimulatedDevice::new(ByteSize::from_mb(32));
    let config = RunConfig {
        enable_offload: true,
        offload_threshold: "8M".into(),
        offload_units: vec!["reference_net".into(), "diffusion_net".into()],
        ..windowed_config(4, 2)
    };
    let mut runner = ChunkedRunner::new(config)
        .setup(Arc::new(device.clone()), networks(&device))
        .unwrap();
    let mut step = ScopedStep {
        device: device.clone(),
        seen: Vec::new(),
    };

    let out = runner.run(&mut step, &inputs(12, 12), &CancelFlag::new()).unwrap();

    assert_eq!(out.frames.len(), 12);
    assert_eq!(step.seen, vec![(Placement::Fast, Placement::Fast); 3]);
    let registry = runner.manager().registry();
    assert_eq!(registry.placement("reference_net"), Some(Placement::Reserve));
    assert_eq!(registry.placement("diffusion_net"), Some(Placement::Reserve));
    assert!(out.metrics.chunks.iter().all(|c| c.usage_after_bytes == 0));
}

#[test]
fn test_units_stay_fast_when_offload_disabled() {
    let device = SimulatedDevice::new(ByteSize::from_mb(32));
    let mut runner = ChunkedRunner::new(windowed_config(4, 2))
        .setup(Arc::new(device.clone()), networks(&device))
        .unwrap();
    let mut step = ScopedStep {
        device: device.clone(),
        seen: Vec::new(),
    };

    let out = runner.run(&mut step, &inputs(8, 8), &CancelFlag::new()).unwrap();

    let registry = runner.manager().registry();
    assert_eq!(registry.placement("reference_net"), Some(Placement::Fast));
    assert_eq!(registry.placement("diffusion_net"), Some(Placement::Fast));
    assert_eq!(out.metrics.chunks[1].usage_before_bytes, 10 * MB);
}

// ── Configuration ──────────────────────────────────────────────

#[test]
fn test_config_file_drives_runner() {
    let path = std::env::temp_dir().join(format!("tiered-rt-config-{}.toml", std::process::id()));
    std::fs::write(
        &path,
        "chunk_length = 5\nwindow_size = 3\ninit_window_copies = 1\nseed = 9\n",
    )
    .unwrap();
    let config = RunConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let device = SimulatedDevice::new(ByteSize::from_mb(64));
    let mut step = RecordingStep::new();
    let out = ready(config, &device)
        .run(&mut step, &inputs(10, 10), &CancelFlag::new())
        .unwrap();

    assert_eq!(out.frames.len(), 10);
    assert_eq!(step.requests[0].window.len(), 1);
    assert_eq!(step.requests[1].window.len(), 3);
}

#[test]
fn test_missing_config_file_is_config_error() {
    let err = RunConfig::from_file(std::path::Path::new("/nonexistent/tiered.toml")).unwrap_err();
    assert!(matches!(err, RuntimeError::Config(_)));
}
