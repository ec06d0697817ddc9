// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The memory manager: registry plus policy, passed explicitly.
//!
//! One [`MemoryManager`] is built at run start and handed by `&mut` to
//! every component that places or uses units. Scoped acquisition lives
//! here because it needs both the registry (to move units) and the
//! policy (to know whether offloading is enabled).

use crate::{
    FastMemory, MemoryError, MemoryStats, OffloadConfig, OffloadOutcome, Placement,
    PlacementPolicy, Precision, ResourceRegistry, UnitGuard, UnitHandle,
};
use std::fmt::Display;
use std::sync::Arc;

pub struct MemoryManager {
    registry: ResourceRegistry,
    policy: PlacementPolicy,
}

impl MemoryManager {
    pub fn new(device: Arc<dyn FastMemory>, config: OffloadConfig) -> Self {
        tracing::info!(
            "memory manager: offload {}, threshold {}, {} units in eviction order",
            if config.enabled { "enabled" } else { "disabled" },
            config.threshold,
            config.eviction_priority.len(),
        );
        Self {
            registry: ResourceRegistry::new(device),
            policy: PlacementPolicy::new(config),
        }
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.registry
    }

    pub fn policy(&self) -> &PlacementPolicy {
        &self.policy
    }

    pub fn register(&mut self, name: impl Into<String>, handle: Box<dyn UnitHandle>) -> Placement {
        self.registry.register(name, handle)
    }

    pub fn current_usage(&self) -> usize {
        self.registry.current_usage()
    }

    pub fn should_offload(&self) -> bool {
        self.policy.should_offload(&self.registry)
    }

    pub fn auto_offload_if_needed(&mut self) -> Result<OffloadOutcome, MemoryError> {
        self.policy.auto_offload_if_needed(&mut self.registry)
    }

    pub fn move_to_fast(&mut self, name: &str, precision: Option<Precision>) -> Result<(), MemoryError> {
        self.registry.move_to_fast(name, precision)
    }

    pub fn move_to_reserve(&mut self, name: &str) -> Result<(), MemoryError> {
        self.registry.move_to_reserve(name)
    }

    pub fn reclaim(&self) {
        self.registry.reclaim();
    }

    /// Brings `name` into fast memory until the returned guard drops.
    ///
    /// If the promotion itself fails, a sweep runs before the error is
    /// returned so a caller-level retry starts with maximal headroom.
    pub fn acquire(&mut self, name: &str, precision: Option<Precision>) -> Result<UnitGuard<'_>, MemoryError> {
        let placement = self
            .registry
            .placement(name)
            .ok_or_else(|| MemoryError::UnregisteredUnit(name.to_string()))?;
        let was_in_reserve = placement == Placement::Reserve;

        if was_in_reserve {
            if let Err(e) = self.registry.move_to_fast(name, precision) {
                tracing::error!("could not bring '{name}' into fast memory: {e}");
                self.registry.reclaim();
                return Err(e);
            }
        }

        Ok(UnitGuard::new(
            &mut self.registry,
            name.to_string(),
            was_in_reserve,
            self.policy.offload_enabled(),
        ))
    }

    /// Runs `op` with `name` in fast memory, then restores its tier.
    ///
    /// On failure of `op`, a reclamation sweep runs before the unit is
    /// restored and the error propagates. A failed restoration is logged
    /// and never replaces `op`'s result.
    pub fn with_unit<T, E, F>(&mut self, name: &str, precision: Option<Precision>, op: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn UnitHandle) -> Result<T, E>,
        E: From<MemoryError> + Display,
    {
        let mut guard = self.acquire(name, precision)?;

        let result = match guard.handle() {
            Ok(unit) => op(unit),
            Err(e) => Err(E::from(e)),
        };

        if let Err(e) = &result {
            tracing::error!("error while using '{name}': {e}");
            guard.reclaim();
        }

        drop(guard);
        result
    }

    /// Snapshot of usage and placement.
    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            fast_memory_bytes: self.registry.current_usage(),
            reserved_bytes: self.registry.reserved_bytes(),
            placements: self.registry.placements(),
            offload_enabled: self.policy.offload_enabled(),
            threshold_bytes: self.policy.threshold().as_bytes(),
        }
    }
}

impl std::fmt::Debug for MemoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryManager")
            .field("registry", &self.registry)
            .field("policy", &self.policy)
            .finish()
    }
}
