// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The fast-memory device seam and an in-process simulated device.
//!
//! [`FastMemory`] is the ground truth the registry consults: it reports
//! what is really allocated, not what the registry believes is placed.
//!
//! [`SimulatedDevice`] models an accelerator allocator with a caching
//! layer. Freed pages are not returned immediately; they stay cached and
//! keep counting against capacity until [`FastMemory::reclaim`] runs.
//! This is what makes "sweep, then retry once" a meaningful recovery.

use crate::{ByteSize, DeviceStats, MemoryError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A fast-memory tier that can be queried and swept.
pub trait FastMemory: Send + Sync {
    /// Bytes currently held by live allocations.
    fn allocated_bytes(&self) -> usize;

    /// Bytes held by the allocator, including cached free pages.
    fn reserved_bytes(&self) -> usize;

    /// Synchronises outstanding work and releases cached pages.
    ///
    /// After this returns, [`allocated_bytes`](FastMemory::allocated_bytes)
    /// reflects every relocation completed before the call.
    fn reclaim(&self);
}

pub(crate) struct DeviceInner {
    capacity: ByteSize,
    allocated_bytes: AtomicUsize,
    /// Freed but not yet released pages.
    cached_bytes: AtomicUsize,
    stats: Mutex<DeviceStats>,
}

impl DeviceInner {
    fn release(&self, size_bytes: usize) {
        self.allocated_bytes.fetch_sub(size_bytes, Ordering::Release);
        self.cached_bytes.fetch_add(size_bytes, Ordering::Release);
        if let Ok(mut stats) = self.stats.lock() {
            stats.record_release();
        }
    }
}

/// A capacity-bounded device with a caching allocator.
///
/// Cloning yields another handle to the same device.
///
/// # Example
/// ```
/// use memory_manager::{ByteSize, FastMemory, SimulatedDevice};
///
/// let device = SimulatedDevice::new(ByteSize::from_mb(8));
/// let buf = device.allocate(4 * 1024 * 1024).unwrap();
/// assert_eq!(device.allocated_bytes(), 4 * 1024 * 1024);
///
/// drop(buf);
/// assert_eq!(device.allocated_bytes(), 0);
/// assert_eq!(device.reserved_bytes(), 4 * 1024 * 1024); // still cached
///
/// device.reclaim();
/// assert_eq!(device.reserved_bytes(), 0);
/// ```
#[derive(Clone)]
pub struct SimulatedDevice {
    inner: Arc<DeviceInner>,
}

impl SimulatedDevice {
    pub fn new(capacity: ByteSize) -> Self {
        Self {
            inner: Arc::new(DeviceInner {
                capacity,
                allocated_bytes: AtomicUsize::new(0),
                cached_bytes: AtomicUsize::new(0),
                stats: Mutex::new(DeviceStats::default()),
            }),
        }
    }

    /// Allocates `size_bytes` of device memory.
    ///
    /// Cached pages count against capacity, so an allocation can fail
    /// here and succeed after a [`reclaim`](FastMemory::reclaim).
    pub fn allocate(&self, size_bytes: usize) -> Result<DeviceBuffer, MemoryError> {
        let capacity = self.inner.capacity.as_bytes();
        let held = self.reserved_bytes();

        if held.checked_add(size_bytes).map_or(true, |total| total > capacity) {
            if let Ok(mut stats) = self.inner.stats.lock() {
                stats.record_oom();
            }
            return Err(MemoryError::ResourceExhaustion {
                requested_bytes: size_bytes,
                available_bytes: capacity.saturating_sub(held),
                capacity_bytes: capacity,
            });
        }

        self.inner
            .allocated_bytes
            .fetch_add(size_bytes, Ordering::Release);

        if let Ok(mut stats) = self.inner.stats.lock() {
            stats.record_allocation(size_bytes);
            stats.update_peak(self.inner.allocated_bytes.load(Ordering::Acquire));
        }

        Ok(DeviceBuffer {
            device: Arc::clone(&self.inner),
            size_bytes,
        })
    }

    pub fn capacity(&self) -> ByteSize {
        self.inner.capacity
    }

    /// Bytes that can be allocated without a sweep.
    pub fn available_bytes(&self) -> usize {
        self.inner
            .capacity
            .as_bytes()
            .saturating_sub(self.reserved_bytes())
    }

    pub fn cached_bytes(&self) -> usize {
        self.inner.cached_bytes.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> DeviceStats {
        self.inner
            .stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

impl FastMemory for SimulatedDevice {
    fn allocated_bytes(&self) -> usize {
        self.inner.allocated_bytes.load(Ordering::Acquire)
    }

    fn reserved_bytes(&self) -> usize {
        self.allocated_bytes() + self.cached_bytes()
    }

    fn reclaim(&self) {
        let freed = self.inner.cached_bytes.swap(0, Ordering::AcqRel);
        if let Ok(mut stats) = self.inner.stats.lock() {
            stats.record_reclaim(freed);
        }
    }
}

impl std::fmt::Debug for SimulatedDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedDevice")
            .field("capacity", &self.inner.capacity)
            .field("allocated_bytes", &self.allocated_bytes())
            .field("cached_bytes", &self.cached_bytes())
            .finish()
    }
}

/// An RAII handle to a device allocation.
///
/// Dropping it moves the bytes from "allocated" to "cached" on the owning
/// device; they become reusable after the next sweep.
pub struct DeviceBuffer {
    device: Arc<DeviceInner>,
    size_bytes: usize,
}

impl DeviceBuffer {
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        self.device.release(self.size_bytes);
    }
}

impl std::fmt::Debug for DeviceBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("size_bytes", &self.size_bytes)
            .finish()
    }
}
