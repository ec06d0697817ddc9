// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Synthetic units and a synthetic chunk step for demos.
//!
//! The units mirror a talking-head video pipeline: a reference network
//! that encodes the seed image, an audio encoder for conditioning, the
//! denoising network and a decoder. Sizes are fp32 footprints.

use chunk_runtime::{ChunkOutput, ChunkRequest, ChunkStep, Frame, StdRng, StepError};
use memory_manager::{ByteSize, MemoryManager, Precision, SimulatedDevice, SimulatedUnit, UnitHandle};
use rand::Rng;

const GIB: usize = 1024 * 1024 * 1024;

/// Name and fp32 footprint of every synthetic unit.
pub const UNITS: &[(&str, usize)] = &[
    ("reference_net", 3 * GIB + GIB / 2),
    ("diffusion_net", 4 * GIB),
    ("audio_encoder", GIB + GIB / 4),
    ("image_proj", GIB / 8),
    ("decoder", GIB / 3),
];

/// Builds the synthetic units, loading each into fast memory when it fits.
pub fn units(device: &SimulatedDevice, precision: Precision) -> Vec<(String, Box<dyn UnitHandle>)> {
    UNITS
        .iter()
        .map(|&(name, base_bytes)| {
            let handle: Box<dyn UnitHandle> =
                match SimulatedUnit::resident(device.clone(), base_bytes, precision) {
                    Ok(unit) => Box::new(unit),
                    Err(e) => {
                        tracing::warn!("'{name}' does not fit at load time, starting in reserve: {e}");
                        Box::new(SimulatedUnit::new(device.clone(), base_bytes, precision))
                    }
                };
            (name.to_string(), handle)
        })
        .collect()
}

pub fn device(capacity: &str) -> anyhow::Result<SimulatedDevice> {
    let capacity = ByteSize::parse(capacity)?;
    Ok(SimulatedDevice::new(capacity))
}

/// Produces noisy frames pulled toward the mean of the prior window.
///
/// Every denoising step allocates a transient activation buffer, so a
/// device near capacity exercises the exhaustion path.
pub struct SyntheticStep {
    pub device: SimulatedDevice,
    pub frame_len: usize,
    pub activation_bytes: usize,
}

impl SyntheticStep {
    fn denoise(&self, request: &ChunkRequest, generator: &mut StdRng) -> Result<Vec<Frame>, StepError> {
        let window = request.conditioned_window();
        let anchor: f32 = window
            .iter()
            .flat_map(|f| f.values.iter())
            .map(|v| (v + 1.0) / 2.0)
            .sum::<f32>()
            / window.iter().map(Frame::len).sum::<usize>().max(1) as f32;

        let mut frames: Vec<Frame> = (0..request.target_length)
            .map(|_| Frame::new((0..self.frame_len).map(|_| generator.gen::<f32>()).collect()))
            .collect();

        for _ in 0..request.inference_steps {
            let _activations = self.device.allocate(self.activation_bytes)?;
            let pull = 1.0 / request.guidance_scale.max(1.0);
            for (frame, row) in frames.iter_mut().zip(request.conditioning.iter()) {
                let bias = row.first().copied().unwrap_or(0.0) * 0.01;
                for v in &mut frame.values {
                    *v = (*v + (anchor - *v) * pull + bias).clamp(0.0, 1.0);
                }
            }
        }
        Ok(frames)
    }
}

impl ChunkStep for SyntheticStep {
    fn generate(
        &mut self,
        manager: &mut MemoryManager,
        request: &ChunkRequest,
        generator: &mut StdRng,
    ) -> Result<ChunkOutput, StepError> {
        manager.with_unit("audio_encoder", None, |_| Ok::<_, StepError>(()))?;
        manager.with_unit("image_proj", None, |_| Ok::<_, StepError>(()))?;
        manager.with_unit("reference_net", None, |_| Ok::<_, StepError>(()))?;

        let this = &*self;
        let frames = manager.with_unit("diffusion_net", None, |_| this.denoise(request, generator))?;

        manager.with_unit("decoder", None, |_| {
            let _decoded = self.device.allocate(self.activation_bytes / 2)?;
            Ok::<_, StepError>(())
        })?;

        Ok(ChunkOutput { frames })
    }
}
