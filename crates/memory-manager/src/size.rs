// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Byte quantities with human-readable parsing.
//!
//! [`ByteSize`] is used for the offload threshold and for device
//! capacities. Config files write them as `"14G"` or `"13.5GB"`.

use crate::MemoryError;
use std::fmt;

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// A byte count.
///
/// # Parsing
/// Binary suffixes, case-insensitive, optional fractional part:
/// - `"512M"` or `"512MB"` → 512 × 1024² bytes
/// - `"13.5G"` → 13.5 × 1024³ bytes
/// - `"2048K"` → 2048 × 1024 bytes
/// - `"1073741824"` → raw byte count
///
/// # Examples
/// ```
/// use memory_manager::ByteSize;
///
/// let t = ByteSize::parse("14G").unwrap();
/// assert_eq!(t.as_bytes(), 14 * 1024 * 1024 * 1024);
/// assert!((t.as_gb() - 14.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ByteSize {
    bytes: usize,
}

impl ByteSize {
    /// Creates a size from a byte count.
    pub fn from_bytes(bytes: usize) -> Self {
        Self { bytes }
    }

    /// Creates a size from megabytes, saturating at `usize::MAX`.
    pub fn from_mb(mb: usize) -> Self {
        Self {
            bytes: mb.saturating_mul(1024 * 1024),
        }
    }

    /// Creates a size from (possibly fractional) gigabytes.
    pub fn from_gb(gb: f64) -> Self {
        Self {
            bytes: (gb.max(0.0) * GIB) as usize,
        }
    }

    pub fn as_bytes(&self) -> usize {
        self.bytes
    }

    pub fn as_gb(&self) -> f64 {
        self.bytes as f64 / GIB
    }

    /// Parses a human-readable size string.
    pub fn parse(s: &str) -> Result<Self, MemoryError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(MemoryError::InvalidSize("empty size string".into()));
        }

        let upper = trimmed.to_ascii_uppercase();
        let digits_end = upper
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(upper.len());
        let (number, suffix) = upper.split_at(digits_end);

        let multiplier = match suffix.trim() {
            "" | "B" => 1.0,
            "K" | "KB" => KIB,
            "M" | "MB" => MIB,
            "G" | "GB" => GIB,
            other => {
                return Err(MemoryError::InvalidSize(format!(
                    "unknown suffix '{other}' in '{trimmed}', expected K, M or G"
                )))
            }
        };

        let value: f64 = number.parse().map_err(|_| {
            MemoryError::InvalidSize(format!("'{trimmed}' does not start with a number"))
        })?;

        let bytes = value * multiplier;
        if !bytes.is_finite() || bytes >= usize::MAX as f64 {
            return Err(MemoryError::InvalidSize(format!("'{trimmed}' overflows")));
        }

        Ok(Self {
            bytes: bytes as usize,
        })
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.bytes as f64;
        if b >= GIB {
            write!(f, "{:.2} GB", b / GIB)
        } else if b >= MIB {
            write!(f, "{:.2} MB", b / MIB)
        } else if b >= KIB {
            write!(f, "{:.2} KB", b / KIB)
        } else {
            write!(f, "{} B", self.bytes)
        }
    }
}

impl std::str::FromStr for ByteSize {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
