// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The per-chunk computation interface and the data that crosses it.

use crate::StepError;
use memory_manager::MemoryManager;
use rand::rngs::StdRng;

/// One generated frame. Values live in `[0, 1]` on output.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub values: Vec<f32>,
}

impl Frame {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// A frame of `len` elements all set to `value`.
    pub fn filled(len: usize, value: f32) -> Self {
        Self {
            values: vec![value; len],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Maps `[0, 1]` output values to the `[-1, 1]` input convention.
    pub fn rescaled(&self) -> Frame {
        Frame {
            values: self.values.iter().map(|x| x * 2.0 - 1.0).collect(),
        }
    }
}

/// Everything a step needs to produce one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRequest {
    /// Zero-based chunk index.
    pub index: usize,
    /// The seed input every chunk is anchored to.
    pub reference: Frame,
    /// Prior-window frames, oldest first.
    pub window: Vec<Frame>,
    /// This chunk's conditioning slice, one row per target frame.
    pub conditioning: Vec<Vec<f32>>,
    /// Frames the step is asked to produce.
    pub target_length: usize,
    pub inference_steps: usize,
    pub guidance_scale: f32,
    /// True only for the first chunk of a run.
    pub is_new_sequence: bool,
}

impl ChunkRequest {
    /// The reference frame followed by the prior window.
    pub fn conditioned_window(&self) -> Vec<Frame> {
        std::iter::once(self.reference.clone())
            .chain(self.window.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChunkOutput {
    pub frames: Vec<Frame>,
}

/// A unit of work producing one chunk of frames.
///
/// Implementations get mutable access to the [`MemoryManager`] so they can
/// scope unit usage with [`MemoryManager::with_unit`]. The generator is a
/// clone of the run's generator taken before the first attempt; a retry
/// receives an identical clone.
pub trait ChunkStep {
    fn generate(
        &mut self,
        manager: &mut MemoryManager,
        request: &ChunkRequest,
        generator: &mut StdRng,
    ) -> Result<ChunkOutput, StepError>;
}
