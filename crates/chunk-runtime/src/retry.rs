// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Exactly-once retry after resource exhaustion.

use crate::StepError;
use memory_manager::{FastMemory, MemoryError};
use std::fmt::Display;

/// Errors that can tell resource exhaustion apart from other failures.
pub trait Recoverable {
    fn is_resource_exhaustion(&self) -> bool;
}

impl Recoverable for MemoryError {
    fn is_resource_exhaustion(&self) -> bool {
        MemoryError::is_resource_exhaustion(self)
    }
}

impl Recoverable for StepError {
    fn is_resource_exhaustion(&self) -> bool {
        match self {
            StepError::Memory(e) => e.is_resource_exhaustion(),
            StepError::Computation(_) => false,
        }
    }
}

/// A successful result and whether it needed the retry.
#[derive(Debug, Clone, PartialEq)]
pub struct Retried<T> {
    pub value: T,
    pub retried: bool,
}

/// Runs `step`; on exhaustion, reclaims `device` and runs it once more.
///
/// The second attempt's error propagates unchanged. Errors other than
/// exhaustion are never retried.
pub fn run_with_retry<T, E, F>(device: &dyn FastMemory, step: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: Recoverable + Display,
{
    run_with_retry_traced(device, step).map(|r| r.value)
}

/// [`run_with_retry`], reporting whether the retry was used.
pub fn run_with_retry_traced<T, E, F>(device: &dyn FastMemory, mut step: F) -> Result<Retried<T>, E>
where
    F: FnMut() -> Result<T, E>,
    E: Recoverable + Display,
{
    match step() {
        Ok(value) => Ok(Retried {
            value,
            retried: false,
        }),
        Err(e) if e.is_resource_exhaustion() => {
            tracing::error!("out of fast memory: {e}");
            device.reclaim();
            tracing::info!("retrying once after reclamation");
            step().map(|value| Retried {
                value,
                retried: true,
            })
        }
        Err(e) => Err(e),
    }
}
