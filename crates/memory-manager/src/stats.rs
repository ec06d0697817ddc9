// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Statistics for diagnosis: device counters and placement snapshots.
//!
//! Nothing here feeds back into placement decisions. [`MemoryStats`] is
//! what the runner dumps after setup and on request; [`DeviceStats`] are
//! the cumulative counters kept by the simulated device.

use crate::Placement;
use std::collections::BTreeMap;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Cumulative counters kept by a [`SimulatedDevice`](crate::SimulatedDevice).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DeviceStats {
    /// Successful allocations.
    pub allocations: u64,
    /// Allocations returned to the cache.
    pub releases: u64,
    /// Allocations refused for lack of capacity.
    pub oom_count: u64,
    /// Reclamation sweeps performed.
    pub reclaims: u64,
    /// Total bytes released by sweeps.
    pub reclaimed_bytes: u64,
    /// High-water mark of live allocations.
    pub peak_allocated_bytes: usize,
    /// Total bytes ever allocated.
    pub cumulative_allocated_bytes: u64,
}

impl DeviceStats {
    pub(crate) fn record_allocation(&mut self, size: usize) {
        self.allocations += 1;
        self.cumulative_allocated_bytes += size as u64;
    }

    pub(crate) fn record_release(&mut self) {
        self.releases += 1;
    }

    pub(crate) fn record_oom(&mut self) {
        self.oom_count += 1;
    }

    pub(crate) fn record_reclaim(&mut self, freed: usize) {
        self.reclaims += 1;
        self.reclaimed_bytes += freed as u64;
    }

    pub(crate) fn update_peak(&mut self, current_bytes: usize) {
        if current_bytes > self.peak_allocated_bytes {
            self.peak_allocated_bytes = current_bytes;
        }
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "Device: {} allocations, {} releases, {} OOMs, {} sweeps ({:.2} GB reclaimed), peak {:.2} GB",
            self.allocations,
            self.releases,
            self.oom_count,
            self.reclaims,
            self.reclaimed_bytes as f64 / GIB,
            self.peak_allocated_bytes as f64 / GIB,
        )
    }
}

/// A point-in-time view of fast-memory usage and unit placement.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MemoryStats {
    /// Live fast-memory allocations, as reported by the device.
    pub fast_memory_bytes: usize,
    /// Fast memory held by the allocator, including cached pages.
    pub reserved_bytes: usize,
    /// Tier of every registered unit.
    pub placements: BTreeMap<String, Placement>,
    pub offload_enabled: bool,
    pub threshold_bytes: usize,
}

impl MemoryStats {
    pub fn fast_memory_gb(&self) -> f64 {
        self.fast_memory_bytes as f64 / GIB
    }

    /// Number of units currently placed in fast memory.
    pub fn units_in_fast(&self) -> usize {
        self.placements
            .values()
            .filter(|p| **p == Placement::Fast)
            .count()
    }

    pub fn summary(&self) -> String {
        format!(
            "Memory: {:.2} GB allocated, {:.2} GB reserved, threshold {:.2} GB, \
             offload {}, {}/{} units in fast memory",
            self.fast_memory_gb(),
            self.reserved_bytes as f64 / GIB,
            self.threshold_bytes as f64 / GIB,
            if self.offload_enabled { "on" } else { "off" },
            self.units_in_fast(),
            self.placements.len(),
        )
    }

    /// Emits one log line per field.
    pub fn log(&self) {
        tracing::info!("memory statistics:");
        tracing::info!("  fast_memory_gb: {:.2}", self.fast_memory_gb());
        tracing::info!("  reserved_gb: {:.2}", self.reserved_bytes as f64 / GIB);
        tracing::info!("  offload_enabled: {}", self.offload_enabled);
        tracing::info!("  threshold_gb: {:.2}", self.threshold_bytes as f64 / GIB);
        for (name, placement) in &self.placements {
            tracing::info!("  {name}: {placement}");
        }
    }
}
