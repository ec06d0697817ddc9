// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for tier placement and relocation.

/// Errors that can occur while placing, relocating, or sizing units.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    /// Fast memory could not satisfy an allocation or relocation.
    #[error("fast memory exhausted: requested {requested_bytes} bytes, but only {available_bytes} available (capacity: {capacity_bytes})")]
    ResourceExhaustion {
        requested_bytes: usize,
        available_bytes: usize,
        capacity_bytes: usize,
    },

    /// The named unit was never registered.
    #[error("unit '{0}' is not registered")]
    UnregisteredUnit(String),

    /// A relocation failed for a reason other than exhaustion.
    #[error("relocation of '{unit}' failed: {detail}")]
    Relocation { unit: String, detail: String },

    /// A byte-size string could not be parsed.
    #[error("invalid size: {0}")]
    InvalidSize(String),
}

impl MemoryError {
    /// Returns `true` for the failure class that is worth one retry after
    /// a reclamation sweep.
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, MemoryError::ResourceExhaustion { .. })
    }
}
