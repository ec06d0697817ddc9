// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # memory-manager
//!
//! Decides which computational units (models) live in limited fast
//! memory and which wait in reserve memory, and moves them between the
//! two tiers as pressure dictates.
//!
//! # Key Components
//!
//! - [`ResourceRegistry`]: owns every [`ManagedUnit`], is the only thing
//!   that moves units between tiers, and reads real usage from a
//!   [`FastMemory`] device.
//! - [`PlacementPolicy`]: threshold check plus priority-ordered eviction.
//! - [`MemoryManager`]: registry + policy bundled for context passing,
//!   with scoped acquisition ([`MemoryManager::with_unit`],
//!   [`MemoryManager::acquire`]).
//! - [`UnitGuard`]: RAII guard that restores a unit's tier on drop.
//! - [`SimulatedDevice`] / [`SimulatedUnit`]: an in-process device with a
//!   caching allocator, for tests, benchmarks and dry runs.
//!
//! # Ownership Model
//!
//! ```text
//! MemoryManager ──owns──► ResourceRegistry ──owns──► ManagedUnit ──► Box<dyn UnitHandle>
//!       │                        │
//!       │ acquire(name)          └── Arc<dyn FastMemory>  (ground-truth usage, reclaim)
//!       ▼
//!   UnitGuard<'_>  ◄── &mut ResourceRegistry
//!       │
//!       │  drop()
//!       ▼
//!   move_to_reserve(name)   (only if promoted and offload enabled)
//! ```
//!
//! # Example
//! ```
//! use memory_manager::{
//!     ByteSize, MemoryManager, OffloadConfig, OffloadOutcome, Precision, SimulatedDevice,
//!     SimulatedUnit,
//! };
//! use std::sync::Arc;
//!
//! let device = SimulatedDevice::new(ByteSize::from_mb(16));
//! let config = OffloadConfig {
//!     enabled: true,
//!     threshold: ByteSize::from_mb(8),
//!     eviction_priority: vec!["reference_net".into()],
//! };
//! let mut manager = MemoryManager::new(Arc::new(device.clone()), config);
//!
//! let unit = SimulatedUnit::resident(device.clone(), 6 << 20, Precision::F32).unwrap();
//! manager.register("reference_net", Box::new(unit));
//! let unit = SimulatedUnit::resident(device, 4 << 20, Precision::F32).unwrap();
//! manager.register("diffusion_net", Box::new(unit));
//!
//! let outcome = manager.auto_offload_if_needed().unwrap();
//! assert_eq!(outcome, OffloadOutcome::Relieved { evicted: vec!["reference_net".into()] });
//! ```

mod device;
mod error;
mod guard;
mod manager;
mod policy;
mod registry;
mod size;
mod stats;
mod unit;

pub use device::{DeviceBuffer, FastMemory, SimulatedDevice};
pub use error::MemoryError;
pub use guard::UnitGuard;
pub use manager::MemoryManager;
pub use policy::{OffloadConfig, OffloadOutcome, PlacementPolicy};
pub use registry::ResourceRegistry;
pub use size::ByteSize;
pub use stats::{DeviceStats, MemoryStats};
pub use unit::{ManagedUnit, Placement, Precision, SimulatedUnit, UnitHandle};
