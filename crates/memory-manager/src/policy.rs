// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Threshold-triggered, priority-ordered eviction.
//!
//! The policy is deliberately simple: when real usage crosses the
//! threshold, evict units in the configured order until usage is back at
//! or below it. It is not an optimal placement. Earlier entries in the
//! priority list go first, so callers list the unit needed least soon
//! first.

use crate::{ByteSize, MemoryError, Placement, ResourceRegistry};

/// Offload settings, read once at setup.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OffloadConfig {
    /// Whether units may be moved out of fast memory at all.
    pub enabled: bool,
    /// Usage above this triggers eviction.
    pub threshold: ByteSize,
    /// Units in eviction order; unregistered names are skipped.
    pub eviction_priority: Vec<String>,
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: ByteSize::from_gb(14.0),
            eviction_priority: Vec::new(),
        }
    }
}

/// What [`PlacementPolicy::auto_offload_if_needed`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OffloadOutcome {
    /// Usage was already at or below the threshold (or offload is off).
    NotNeeded,
    /// Usage fell to the threshold after evicting these units, in order.
    Relieved { evicted: Vec<String> },
    /// The priority list ran out first. Not an error: the next
    /// allocation may still fail and will report exhaustion itself.
    PolicyExhausted {
        evicted: Vec<String>,
        usage_bytes: usize,
    },
}

impl OffloadOutcome {
    pub fn evicted(&self) -> &[String] {
        match self {
            OffloadOutcome::NotNeeded => &[],
            OffloadOutcome::Relieved { evicted } | OffloadOutcome::PolicyExhausted { evicted, .. } => {
                evicted
            }
        }
    }
}

/// Decides when eviction is required and which units to evict.
#[derive(Debug, Clone)]
pub struct PlacementPolicy {
    config: OffloadConfig,
}

impl PlacementPolicy {
    pub fn new(config: OffloadConfig) -> Self {
        Self { config }
    }

    pub fn offload_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn threshold(&self) -> ByteSize {
        self.config.threshold
    }

    pub fn eviction_priority(&self) -> &[String] {
        &self.config.eviction_priority
    }

    /// `true` iff offloading is enabled and real usage exceeds the threshold.
    pub fn should_offload(&self, registry: &ResourceRegistry) -> bool {
        self.config.enabled && registry.current_usage() > self.config.threshold.as_bytes()
    }

    /// Evicts units in priority order until usage is at or below the
    /// threshold or the list is exhausted.
    pub fn auto_offload_if_needed(
        &self,
        registry: &mut ResourceRegistry,
    ) -> Result<OffloadOutcome, MemoryError> {
        if !self.should_offload(registry) {
            return Ok(OffloadOutcome::NotNeeded);
        }

        tracing::info!(
            "fast memory usage ({}) exceeds threshold ({})",
            ByteSize::from_bytes(registry.current_usage()),
            self.config.threshold,
        );

        let mut evicted = Vec::new();
        for name in &self.config.eviction_priority {
            if registry.placement(name) != Some(Placement::Fast) {
                continue;
            }

            registry.move_to_reserve(name)?;
            evicted.push(name.clone());

            if !self.should_offload(registry) {
                tracing::info!("sufficient fast memory freed");
                return Ok(OffloadOutcome::Relieved { evicted });
            }
        }

        let usage_bytes = registry.current_usage();
        tracing::warn!(
            "eviction list exhausted with usage still at {}",
            ByteSize::from_bytes(usage_bytes),
        );
        Ok(OffloadOutcome::PolicyExhausted {
            evicted,
            usage_bytes,
        })
    }
}
