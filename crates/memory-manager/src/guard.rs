// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! RAII guard that restores a unit's tier when a scoped use ends.
//!
//! [`UnitGuard`] is returned by
//! [`MemoryManager::acquire`](crate::MemoryManager::acquire). If the unit
//! was promoted out of reserve memory for this use and offloading is
//! enabled, dropping the guard demotes it again. This happens on every
//! exit path, including early returns and unwinding.

use crate::{MemoryError, ResourceRegistry, UnitHandle};

/// Holds a unit in fast memory for the duration of one operation.
///
/// # Example
/// ```
/// use memory_manager::{
///     ByteSize, MemoryManager, OffloadConfig, Placement, Precision, SimulatedDevice,
///     SimulatedUnit, UnitHandle,
/// };
/// use std::sync::Arc;
///
/// let device = SimulatedDevice::new(ByteSize::from_mb(64));
/// let config = OffloadConfig { enabled: true, ..Default::default() };
/// let mut manager = MemoryManager::new(Arc::new(device.clone()), config);
/// manager.register("vae", Box::new(SimulatedUnit::new(device, 1 << 20, Precision::F32)));
///
/// {
///     let mut guard = manager.acquire("vae", None).unwrap();
///     assert_eq!(guard.handle().unwrap().resident_tier(), Placement::Fast);
/// } // restored here
///
/// assert_eq!(manager.registry().placement("vae"), Some(Placement::Reserve));
/// ```
pub struct UnitGuard<'a> {
    registry: &'a mut ResourceRegistry,
    name: String,
    was_in_reserve: bool,
    restore_on_drop: bool,
}

impl<'a> UnitGuard<'a> {
    pub(crate) fn new(
        registry: &'a mut ResourceRegistry,
        name: String,
        was_in_reserve: bool,
        offload_enabled: bool,
    ) -> Self {
        Self {
            registry,
            name,
            was_in_reserve,
            restore_on_drop: was_in_reserve && offload_enabled,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` if the unit was in reserve memory before this acquisition.
    pub fn was_in_reserve(&self) -> bool {
        self.was_in_reserve
    }

    /// The unit being held.
    pub fn handle(&mut self) -> Result<&mut dyn UnitHandle, MemoryError> {
        self.registry.handle_mut(&self.name)
    }

    /// Runs a reclamation sweep while the guard is held.
    pub fn reclaim(&self) {
        self.registry.reclaim();
    }

    /// Ends the scoped use now instead of at end of scope.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for UnitGuard<'_> {
    fn drop(&mut self) {
        if !self.restore_on_drop {
            return;
        }
        if let Err(e) = self.registry.move_to_reserve(&self.name) {
            // Cleanup failures are reported, never propagated.
            tracing::warn!("failed to return '{}' to reserve memory: {e}", self.name);
        }
    }
}

impl std::fmt::Debug for UnitGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitGuard")
            .field("name", &self.name)
            .field("was_in_reserve", &self.was_in_reserve)
            .field("restore_on_drop", &self.restore_on_drop)
            .finish()
    }
}
