// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tiered-rt
//!
//! Command-line interface for the tiered chunk runtime.
//!
//! ## Usage
//! ```bash
//! # Chunked run over a simulated 16 GB device with offloading
//! tiered-rt run --frames 48 --enable-offload --threshold 10G
//!
//! # Show where each unit lands after the initial placement pass
//! tiered-rt inspect --device-capacity 12G --enable-offload
//!
//! # Print the effective configuration as TOML
//! tiered-rt --config run.toml config
//! ```

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tiered-rt",
    about = "Chunked generation with two-tier memory placement",
    version,
    author
)]
struct Cli {
    /// Path to a TOML configuration file. Explicit flags override it.
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a synthetic chunked generation.
    Run {
        #[command(flatten)]
        placement: commands::PlacementArgs,

        /// Frames to return.
        #[arg(short, long, default_value_t = 48)]
        frames: usize,

        /// Conditioning rows; defaults to `frames` padded up to a whole chunk.
        #[arg(long)]
        conditioning_rows: Option<usize>,

        /// Frames per chunk.
        #[arg(long)]
        chunk_length: Option<usize>,

        /// Frames carried from one chunk into the next.
        #[arg(long)]
        window_size: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show the initial placement of the synthetic units.
    Inspect {
        #[command(flatten)]
        placement: commands::PlacementArgs,
    },

    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);
    let base = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            placement,
            frames,
            conditioning_rows,
            chunk_length,
            window_size,
            seed,
        } => {
            let mut config = placement.apply(base);
            if let Some(v) = chunk_length {
                config.chunk_length = v;
            }
            if let Some(v) = window_size {
                config.window_size = v;
            }
            if let Some(v) = seed {
                config.seed = v;
            }
            commands::run::execute(config, placement.device_capacity, frames, conditioning_rows).await
        }
        Commands::Inspect { placement } => {
            let config = placement.apply(base);
            commands::inspect::execute(config, placement.device_capacity).await
        }
        Commands::Config => commands::config::execute(base).await,
    }
}
