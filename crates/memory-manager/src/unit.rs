// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Managed units: tiers, precisions, and the handle seam.
//!
//! A unit is a named computational resource (a model) whose weights live
//! either in fast memory or in reserve memory. The registry only ever
//! touches a unit through its [`UnitHandle`].

use crate::{DeviceBuffer, MemoryError, SimulatedDevice};
use std::fmt;

/// The memory tier a unit occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    /// Limited, compute-local memory (accelerator memory).
    Fast,
    /// Larger, slower memory for units not currently needed.
    Reserve,
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::Fast => f.pad("fast"),
            Placement::Reserve => f.pad("reserve"),
        }
    }
}

/// Numeric precision of a unit's weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Precision {
    F32,
    F16,
    BF16,
}

impl Precision {
    pub fn size_bytes(self) -> usize {
        match self {
            Precision::F32 => 4,
            Precision::F16 | Precision::BF16 => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Precision::F32 => "fp32",
            Precision::F16 => "fp16",
            Precision::BF16 => "bf16",
        }
    }

    /// Parses a config label. Unknown labels fall back to `F32`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "fp16" | "f16" => Precision::F16,
            "bf16" => Precision::BF16,
            "fp32" | "f32" => Precision::F32,
            other => {
                tracing::warn!("unknown precision '{other}', using fp32");
                Precision::F32
            }
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the registry needs from a computational unit.
pub trait UnitHandle: Send {
    /// The tier the unit's parameters physically occupy right now.
    fn resident_tier(&self) -> Placement;

    /// Moves the unit to `target`, optionally converting precision.
    fn relocate(&mut self, target: Placement, precision: Option<Precision>) -> Result<(), MemoryError>;

    fn precision(&self) -> Precision;

    /// Fast-memory footprint at the current precision, if known.
    fn footprint_bytes(&self) -> Option<usize>;
}

/// A registered unit and the registry's view of its placement.
pub struct ManagedUnit {
    name: String,
    footprint_estimate: Option<usize>,
    placement: Placement,
    handle: Box<dyn UnitHandle>,
}

impl ManagedUnit {
    pub(crate) fn new(name: String, handle: Box<dyn UnitHandle>) -> Self {
        Self {
            name,
            footprint_estimate: handle.footprint_bytes(),
            placement: handle.resident_tier(),
            handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn footprint_estimate(&self) -> Option<usize> {
        self.footprint_estimate
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    pub fn handle(&self) -> &dyn UnitHandle {
        self.handle.as_ref()
    }

    pub(crate) fn handle_mut(&mut self) -> &mut dyn UnitHandle {
        self.handle.as_mut()
    }

    /// Re-derives placement and footprint from the handle.
    pub(crate) fn refresh(&mut self) -> Placement {
        self.placement = self.handle.resident_tier();
        self.footprint_estimate = self.handle.footprint_bytes();
        self.placement
    }
}

impl fmt::Debug for ManagedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedUnit")
            .field("name", &self.name)
            .field("footprint_estimate", &self.footprint_estimate)
            .field("placement", &self.placement)
            .finish()
    }
}

/// A unit whose fast-memory residency is a [`SimulatedDevice`] allocation.
///
/// `base_bytes` is the footprint at fp32; other precisions scale it.
pub struct SimulatedUnit {
    device: SimulatedDevice,
    base_bytes: usize,
    precision: Precision,
    buffer: Option<DeviceBuffer>,
}

impl SimulatedUnit {
    /// Creates a unit that starts in reserve memory.
    pub fn new(device: SimulatedDevice, base_bytes: usize, precision: Precision) -> Self {
        Self {
            device,
            base_bytes,
            precision,
            buffer: None,
        }
    }

    /// Creates a unit and loads it into fast memory immediately.
    pub fn resident(
        device: SimulatedDevice,
        base_bytes: usize,
        precision: Precision,
    ) -> Result<Self, MemoryError> {
        let mut unit = Self::new(device, base_bytes, precision);
        unit.relocate(Placement::Fast, None)?;
        Ok(unit)
    }

    fn bytes_at(&self, precision: Precision) -> usize {
        self.base_bytes / Precision::F32.size_bytes() * precision.size_bytes()
    }
}

impl UnitHandle for SimulatedUnit {
    fn resident_tier(&self) -> Placement {
        if self.buffer.is_some() {
            Placement::Fast
        } else {
            Placement::Reserve
        }
    }

    fn relocate(&mut self, target: Placement, precision: Option<Precision>) -> Result<(), MemoryError> {
        let precision = precision.unwrap_or(self.precision);
        match target {
            Placement::Fast => {
                if self.buffer.is_some() && precision == self.precision {
                    return Ok(());
                }
                // Allocate before releasing so a failed conversion leaves
                // the unit where it was.
                let buffer = self.device.allocate(self.bytes_at(precision))?;
                self.buffer = Some(buffer);
            }
            Placement::Reserve => {
                self.buffer = None;
            }
        }
        self.precision = precision;
        Ok(())
    }

    fn precision(&self) -> Precision {
        self.precision
    }

    fn footprint_bytes(&self) -> Option<usize> {
        Some(self.bytes_at(self.precision))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ByteSize, FastMemory};

    #[test]
    fn test_precision_labels() {
        assert_eq!(Precision::from_label("fp16"), Precision::F16);
        assert_eq!(Precision::from_label("BF16"), Precision::BF16);
        assert_eq!(Precision::from_label("fp32"), Precision::F32);
        assert_eq!(Precision::from_label("int4"), Precision::F32);
        assert_eq!(Precision::F16.size_bytes(), 2);
    }

    #[test]
    fn test_simulated_unit_relocation() {
        let device = SimulatedDevice::new(ByteSize::from_bytes(1000));
        let mut unit = SimulatedUnit::new(device.clone(), 400, Precision::F32);
        assert_eq!(unit.resident_tier(), Placement::Reserve);

        unit.relocate(Placement::Fast, None).unwrap();
        assert_eq!(unit.resident_tier(), Placement::Fast);
        assert_eq!(device.allocated_bytes(), 400);

        unit.relocate(Placement::Reserve, None).unwrap();
        assert_eq!(device.allocated_bytes(), 0);
    }

    #[test]
    fn test_simulated_unit_precision_scales_footprint() {
        let device = SimulatedDevice::new(ByteSize::from_bytes(1000));
        let mut unit = SimulatedUnit::new(device.clone(), 400, Precision::F32);
        unit.relocate(Placement::Fast, Some(Precision::F16)).unwrap();
        assert_eq!(unit.precision(), Precision::F16);
        assert_eq!(unit.footprint_bytes(), Some(200));
        assert_eq!(device.allocated_bytes(), 200);
    }

    #[test]
    fn test_failed_relocation_keeps_tier() {
        let device = SimulatedDevice::new(ByteSize::from_bytes(100));
        let mut unit = SimulatedUnit::new(device, 400, Precision::F32);
        let err = unit.relocate(Placement::Fast, None).unwrap_err();
        assert!(err.is_resource_exhaustion());
        assert_eq!(unit.resident_tier(), Placement::Reserve);
        assert_eq!(unit.precision(), Precision::F32);
    }

    #[test]
    fn test_managed_unit_infers_placement() {
        let device = SimulatedDevice::new(ByteSize::from_mb(1));
        let unit = SimulatedUnit::resident(device, 1024, Precision::F32).unwrap();
        let managed = ManagedUnit::new("vae".into(), Box::new(unit));
        assert_eq!(managed.placement(), Placement::Fast);
        assert_eq!(managed.footprint_estimate(), Some(1024));
        assert_eq!(managed.name(), "vae");
    }
}
