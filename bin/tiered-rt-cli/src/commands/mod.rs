// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

pub mod config;
pub mod inspect;
pub mod run;
pub mod synthetic;

use chunk_runtime::RunConfig;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose >= 2)
        .init();
}

/// Reads the TOML file if one was given, defaults otherwise.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RunConfig> {
    let config = match path {
        Some(p) => {
            tracing::info!("loading configuration from {}", p.display());
            RunConfig::from_file(p)?
        }
        None => RunConfig::default(),
    };
    Ok(config)
}

/// Flags shared by commands that place units on a device.
#[derive(clap::Args, Clone)]
pub struct PlacementArgs {
    /// Capacity of the simulated fast-memory device.
    #[arg(long, default_value = "16G")]
    pub device_capacity: String,

    /// Allow units to be moved out of fast memory. `--enable-offload false`
    /// turns off offloading enabled by the config file.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub enable_offload: Option<bool>,

    /// Offload threshold (e.g., "14G", "10.5G").
    #[arg(long)]
    pub threshold: Option<String>,

    /// Comma-separated eviction priority, earliest evicted first.
    #[arg(long)]
    pub offload_units: Option<String>,

    /// Weight precision: fp32, fp16 or bf16.
    #[arg(long)]
    pub precision: Option<String>,
}

impl PlacementArgs {
    pub fn apply(&self, mut config: RunConfig) -> RunConfig {
        if let Some(enabled) = self.enable_offload {
            config.enable_offload = enabled;
        }
        if let Some(t) = &self.threshold {
            config.offload_threshold = t.clone();
        }
        if let Some(units) = &self.offload_units {
            config.offload_units = units
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(p) = &self.precision {
            config.weight_precision = p.clone();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> PlacementArgs {
        PlacementArgs {
            device_capacity: "16G".into(),
            enable_offload: None,
            threshold: None,
            offload_units: None,
            precision: None,
        }
    }

    #[test]
    fn test_apply_keeps_file_values_without_flags() {
        let base = RunConfig {
            enable_offload: true,
            offload_threshold: "9G".into(),
            ..Default::default()
        };
        let config = args().apply(base.clone());
        assert_eq!(config, base);
    }

    #[test]
    fn test_apply_overrides() {
        let flags = PlacementArgs {
            enable_offload: Some(true),
            threshold: Some("10.5G".into()),
            offload_units: Some("reference_net, image_proj,".into()),
            precision: Some("bf16".into()),
            ..args()
        };
        let config = flags.apply(RunConfig::default());
        assert!(config.enable_offload);
        assert_eq!(config.offload_threshold, "10.5G");
        assert_eq!(config.offload_units, vec!["reference_net", "image_proj"]);
        assert_eq!(config.weight_precision, "bf16");
    }

    #[test]
    fn test_apply_can_disable_file_offload() {
        let base = RunConfig {
            enable_offload: true,
            ..Default::default()
        };
        let flags = PlacementArgs {
            enable_offload: Some(false),
            ..args()
        };
        assert!(!flags.apply(base).enable_offload);
    }

    #[test]
    fn test_enable_offload_flag_forms() {
        use clap::Parser;

        #[derive(Parser)]
        struct Harness {
            #[command(flatten)]
            placement: PlacementArgs,
        }

        let parse = |argv: &[&str]| Harness::parse_from(argv.iter().copied()).placement.enable_offload;
        assert_eq!(parse(&["t"]), None);
        assert_eq!(parse(&["t", "--enable-offload"]), Some(true));
        assert_eq!(parse(&["t", "--enable-offload", "false"]), Some(false));
        assert_eq!(parse(&["t", "--enable-offload=true"]), Some(true));
    }

    #[test]
    fn test_load_config_defaults_without_path() {
        assert_eq!(load_config(None).unwrap(), RunConfig::default());
    }
}
