// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `tiered-rt config` command: print the effective configuration.

use chunk_runtime::RunConfig;

pub async fn execute(config: RunConfig) -> anyhow::Result<()> {
    config.validate()?;
    let threshold = config.parse_threshold()?;

    println!("# threshold resolves to {} bytes ({threshold})", threshold.as_bytes());
    if config.enable_offload && !config.offload_units.is_empty() {
        println!("# eviction order: {}", config.offload_units.join(" -> "));
    }
    print!("{}", config.to_toml()?);
    Ok(())
}
