// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `tiered-rt run` command: a synthetic chunked generation.
//!
//! ```text
//! ChunkedRunner<Idle> → setup → <Ready> → run
//! ```
//!
//! The run executes on a blocking thread; Ctrl-C requests cancellation,
//! which takes effect at the next chunk boundary.

use super::synthetic::{self, SyntheticStep};
use chunk_runtime::{CancelFlag, ChunkInputs, ChunkedRunner, Frame, RunConfig, RunOutput};
use std::sync::Arc;

const FRAME_LEN: usize = 64;
const CONDITIONING_DIM: usize = 8;
const ACTIVATION_BYTES: usize = 256 * 1024 * 1024;

pub async fn execute(
    config: RunConfig,
    device_capacity: String,
    frames: usize,
    conditioning_rows: Option<usize>,
) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║           tiered-rt · Chunked Runner                ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    config.validate()?;
    let rows = conditioning_rows
        .unwrap_or_else(|| frames.div_ceil(config.chunk_length) * config.chunk_length);

    println!("  Config:");
    println!("   Device:     {device_capacity}");
    println!(
        "   Offload:    {} (threshold {}, order [{}])",
        if config.enable_offload { "on" } else { "off" },
        config.offload_threshold,
        config.offload_units.join(", "),
    );
    println!("   Precision:  {}", config.precision());
    println!("   Chunks:     {} rows / {} per chunk, window {}", rows, config.chunk_length, config.window_size);
    println!("   Frames:     {frames}");
    println!("   Seed:       {}", config.seed);
    println!();

    println!("  [1/2] Placing units...");
    let device = synthetic::device(&device_capacity)?;
    let units = synthetic::units(&device, config.precision());
    let mut runner = ChunkedRunner::new(config).setup(Arc::new(device.clone()), units)?;
    println!("        {}", runner.manager().stats().summary());
    println!();

    let inputs = ChunkInputs {
        reference: Frame::filled(FRAME_LEN, 0.5),
        conditioning: (0..rows)
            .map(|r| vec![r as f32 / rows.max(1) as f32; CONDITIONING_DIM])
            .collect(),
        total_length: frames,
    };
    let mut step = SyntheticStep {
        device: device.clone(),
        frame_len: FRAME_LEN,
        activation_bytes: ACTIVATION_BYTES,
    };

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping at the next chunk boundary");
            on_interrupt.cancel();
        }
    });

    println!("  [2/2] Running chunks...");
    let (output, runner) = tokio::task::spawn_blocking(move || {
        let output = runner.run(&mut step, &inputs, &cancel);
        (output, runner)
    })
    .await?;
    let output = output?;

    println!();
    print_results(&output);

    println!("  Placement after run:");
    println!("   {}", runner.manager().stats().summary());
    println!("  Device:");
    println!("   {}", device.stats().summary());

    Ok(())
}

fn print_results(output: &RunOutput) {
    println!("  Results:");
    println!("   Frames returned: {}", output.frames.len());
    let means: Vec<String> = output
        .frames
        .iter()
        .take(6)
        .map(|f| format!("{:.3}", f.values.iter().sum::<f32>() / f.len().max(1) as f32))
        .collect();
    println!(
        "   Frame means: [{}]{}",
        means.join(", "),
        if output.frames.len() > 6 { " ..." } else { "" },
    );
    println!();
    println!("  Metrics:");
    println!("   {}", output.metrics.summary());
    for chunk in &output.metrics.chunks {
        println!(
            "   chunk {:>3}: {:>8.2}ms, {:.2} GB -> {:.2} GB{}",
            chunk.index,
            chunk.duration.as_secs_f64() * 1000.0,
            chunk.usage_before_bytes as f64 / (1u64 << 30) as f64,
            chunk.usage_after_bytes as f64 / (1u64 << 30) as f64,
            if chunk.retried { " (retried)" } else { "" },
        );
    }
    println!();
}
