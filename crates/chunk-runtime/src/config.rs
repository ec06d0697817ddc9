// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Run configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! enable_offload = true
//! offload_threshold = "14G"
//! offload_units = ["reference_net", "image_proj"]
//! weight_precision = "fp16"
//! chunk_length = 16
//! window_size = 16
//! init_window_copies = 2
//! inference_steps = 20
//! guidance_scale = 3.5
//! seed = 42
//! ```
//!
//! Every key is optional; missing keys take the [`Default`] values.

use crate::RuntimeError;
use memory_manager::{ByteSize, OffloadConfig, Precision};
use std::path::Path;

/// Configuration for a chunked run. Read once at setup.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Whether units may be moved out of fast memory.
    pub enable_offload: bool,
    /// Usage above this triggers eviction (human-readable, e.g. `"14G"`).
    pub offload_threshold: String,
    /// Eviction priority, earliest evicted first.
    pub offload_units: Vec<String>,
    /// `"fp32"`, `"fp16"` or `"bf16"`.
    pub weight_precision: String,
    /// Frames generated per chunk.
    pub chunk_length: usize,
    /// Trailing frames of one chunk fed into the next.
    pub window_size: usize,
    /// Copies of the reference frame that stand in for the window of chunk 0.
    pub init_window_copies: usize,
    pub inference_steps: usize,
    pub guidance_scale: f32,
    /// Seed for the generator shared by all chunks.
    pub seed: u64,
}

impl RunConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, RuntimeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RuntimeError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, RuntimeError> {
        toml::from_str(toml_str).map_err(|e| RuntimeError::Config(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, RuntimeError> {
        toml::to_string_pretty(self)
            .map_err(|e| RuntimeError::Config(format!("TOML serialise error: {e}")))
    }

    pub fn parse_threshold(&self) -> Result<ByteSize, RuntimeError> {
        ByteSize::parse(&self.offload_threshold)
            .map_err(|e| RuntimeError::Config(format!("invalid offload_threshold: {e}")))
    }

    pub fn precision(&self) -> Precision {
        Precision::from_label(&self.weight_precision)
    }

    /// The memory manager's view of this config.
    pub fn offload_config(&self) -> Result<OffloadConfig, RuntimeError> {
        Ok(OffloadConfig {
            enabled: self.enable_offload,
            threshold: self.parse_threshold()?,
            eviction_priority: self.offload_units.clone(),
        })
    }

    /// Checks values the runner cannot work with.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.chunk_length == 0 {
            return Err(RuntimeError::Config("chunk_length must be at least 1".into()));
        }
        if self.inference_steps == 0 {
            return Err(RuntimeError::Config("inference_steps must be at least 1".into()));
        }
        self.parse_threshold()?;
        Ok(())
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            enable_offload: false,
            offload_threshold: "14G".to_string(),
            offload_units: Vec::new(),
            weight_precision: "fp16".to_string(),
            chunk_length: 16,
            window_size: 16,
            init_window_copies: 2,
            inference_steps: 20,
            guidance_scale: 3.5,
            seed: 42,
        }
    }
}
