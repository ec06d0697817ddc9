// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `tiered-rt inspect` command: initial placement of the synthetic units.

use super::synthetic;
use chunk_runtime::{ChunkedRunner, RunConfig};
use memory_manager::ByteSize;
use std::sync::Arc;

pub async fn execute(config: RunConfig, device_capacity: String) -> anyhow::Result<()> {
    let device = synthetic::device(&device_capacity)?;
    let precision = config.precision();
    let threshold = config.parse_threshold()?;
    let units = synthetic::units(&device, precision);
    let runner = ChunkedRunner::new(config).setup(Arc::new(device.clone()), units)?;
    let stats = runner.manager().stats();

    println!("  Device {} at {precision}, threshold {threshold}", device.capacity());
    println!();
    println!("  {:<16} {:<8} {:>10}", "unit", "tier", "footprint");
    for (name, placement) in &stats.placements {
        let footprint = runner
            .manager()
            .registry()
            .footprint(name)
            .map(|b| ByteSize::from_bytes(b).to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("  {name:<16} {placement:<8} {footprint:>10}");
    }
    println!();
    println!("  {}", stats.summary());
    Ok(())
}
