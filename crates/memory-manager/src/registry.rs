// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The resource registry: sole owner and mutator of unit placement.
//!
//! The registry keeps an intent-level view of which tier every unit is
//! in. Threshold decisions never use that view; they use
//! [`ResourceRegistry::current_usage`], which asks the device. The view
//! is re-derived from each handle at registration and after every move.

use crate::{FastMemory, ManagedUnit, MemoryError, Placement, Precision, UnitHandle};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Owns every [`ManagedUnit`] for the lifetime of a run.
pub struct ResourceRegistry {
    units: BTreeMap<String, ManagedUnit>,
    device: Arc<dyn FastMemory>,
}

impl ResourceRegistry {
    pub fn new(device: Arc<dyn FastMemory>) -> Self {
        Self {
            units: BTreeMap::new(),
            device,
        }
    }

    /// Registers a unit, inferring its placement from the handle.
    ///
    /// Registering a name twice replaces the earlier record.
    pub fn register(&mut self, name: impl Into<String>, handle: Box<dyn UnitHandle>) -> Placement {
        let name = name.into();
        let unit = ManagedUnit::new(name.clone(), handle);
        let placement = unit.placement();
        tracing::debug!(
            "registered '{name}' in {placement} memory ({:?} bytes)",
            unit.footprint_estimate(),
        );
        if self.units.insert(name.clone(), unit).is_some() {
            tracing::warn!("unit '{name}' was already registered, replacing it");
        }
        placement
    }

    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&ManagedUnit> {
        self.units.get(name)
    }

    pub fn placement(&self, name: &str) -> Option<Placement> {
        self.units.get(name).map(ManagedUnit::placement)
    }

    /// The unit's last known footprint in bytes, if the handle reports one.
    pub fn footprint(&self, name: &str) -> Option<usize> {
        self.units.get(name).and_then(ManagedUnit::footprint_estimate)
    }

    pub fn placements(&self) -> BTreeMap<String, Placement> {
        self.units
            .iter()
            .map(|(name, unit)| (name.clone(), unit.placement()))
            .collect()
    }

    /// Real fast-memory consumption, as reported by the device.
    pub fn current_usage(&self) -> usize {
        self.device.allocated_bytes()
    }

    /// Fast memory held by the allocator, cached pages included.
    pub fn reserved_bytes(&self) -> usize {
        self.device.reserved_bytes()
    }

    /// A shared handle to the device, for callers that need to sweep
    /// while the registry itself is borrowed.
    pub fn device(&self) -> Arc<dyn FastMemory> {
        Arc::clone(&self.device)
    }

    /// Runs a reclamation sweep.
    ///
    /// After this returns, [`current_usage`](Self::current_usage) reflects
    /// every relocation made so far.
    pub fn reclaim(&self) {
        let before = self.device.reserved_bytes();
        self.device.reclaim();
        tracing::debug!(
            "reclaimed {} bytes, {} bytes still reserved",
            before.saturating_sub(self.device.reserved_bytes()),
            self.device.reserved_bytes(),
        );
    }

    /// Mutable access to a unit's handle.
    pub fn handle_mut(&mut self, name: &str) -> Result<&mut dyn UnitHandle, MemoryError> {
        self.units
            .get_mut(name)
            .map(ManagedUnit::handle_mut)
            .ok_or_else(|| MemoryError::UnregisteredUnit(name.to_string()))
    }

    /// Moves a unit to reserve memory and sweeps the freed pages.
    ///
    /// Does nothing if the unit is already in reserve memory.
    pub fn move_to_reserve(&mut self, name: &str) -> Result<(), MemoryError> {
        let unit = self
            .units
            .get_mut(name)
            .ok_or_else(|| MemoryError::UnregisteredUnit(name.to_string()))?;

        if unit.placement() == Placement::Reserve {
            return Ok(());
        }

        tracing::info!("offloading '{name}' to reserve memory");
        let result = unit.handle_mut().relocate(Placement::Reserve, None);
        unit.refresh();
        result?;

        self.device.reclaim();
        Ok(())
    }

    /// Moves a unit into fast memory, optionally converting precision.
    ///
    /// Does nothing if the unit is already in fast memory. On exhaustion,
    /// sweeps once and retries once at the unit's current precision. If
    /// the retry also fails, the first exhaustion error is returned.
    pub fn move_to_fast(&mut self, name: &str, precision: Option<Precision>) -> Result<(), MemoryError> {
        let unit = self
            .units
            .get_mut(name)
            .ok_or_else(|| MemoryError::UnregisteredUnit(name.to_string()))?;

        if unit.placement() == Placement::Fast {
            return Ok(());
        }

        tracing::info!("loading '{name}' into fast memory");
        let first = unit.handle_mut().relocate(Placement::Fast, precision);
        unit.refresh();

        let original = match first {
            Ok(()) => return Ok(()),
            Err(e) if e.is_resource_exhaustion() => e,
            Err(e) => return Err(e),
        };

        tracing::error!("out of fast memory while loading '{name}': {original}");
        self.device.reclaim();
        tracing::info!("retrying '{name}' after emergency reclamation");

        let retry = unit.handle_mut().relocate(Placement::Fast, None);
        unit.refresh();
        match retry {
            Ok(()) => {
                tracing::info!("loaded '{name}' after reclamation");
                Ok(())
            }
            Err(e) => {
                tracing::error!("failed to load '{name}' even after reclamation: {e}");
                Err(original)
            }
        }
    }
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("units", &self.units.values().collect::<Vec<_>>())
            .field("current_usage", &self.current_usage())
            .finish()
    }
}
