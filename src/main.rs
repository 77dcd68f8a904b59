// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::env;
use std::process;
use std::time::Instant;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use yaaf::config::consts::INPUT_KEY;
use yaaf::config::{load_and_validate_config, RuntimeBuilder};
use yaaf::context::ExecutionContext;

const DEFAULT_LOG_FILTER: &str = "yaaf=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <pipeline.(yaml|toml)> <input_text>", args[0]);
        eprintln!("Example: {} configs/text-pipeline.yaml \"hello world\"", args[0]);
        eprintln!("Example: {} configs/routing-pipeline.yaml \"urgent: disk full\"", args[0]);
        process::exit(1);
    }

    let config_file = &args[1];
    let input_text = &args[2];

    let config = match load_and_validate_config(config_file) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load {}: {}", config_file, e);
            process::exit(1);
        }
    };
    let pipeline = RuntimeBuilder::from_config(&config)
        .with_context(|| format!("building pipeline from {}", config_file))?;

    println!("🚀 yaaf");
    println!("═══════════════════════════════════");
    println!("Pipeline: {} ({} steps)", pipeline.name(), pipeline.len());
    println!("Input: \"{}\"", input_text);
    println!();

    let mut ctx = ExecutionContext::with_data(input_text.as_str());
    ctx.side_channel_mut().insert(INPUT_KEY, input_text.as_str());

    let started = Instant::now();
    let (ctx, halted) = match pipeline.run(ctx).await {
        Ok(ctx) => (ctx, None),
        Err(run_error) => {
            let message = run_error.error.to_string();
            (run_error.into_context(), Some(message))
        }
    };
    let elapsed = started.elapsed();

    print_report(&ctx);
    println!();
    match halted {
        None => {
            let how = if ctx.stop { "stopped early" } else { "completed" };
            println!("✅ Run {} in {:.2?}", how, elapsed);
            Ok(())
        }
        Some(message) => {
            eprintln!("❌ Run halted after {:.2?}: {}", elapsed, message);
            process::exit(1);
        }
    }
}

fn print_report(ctx: &ExecutionContext) {
    match ctx.data() {
        Some(value) => println!("📦 Payload: {}", value),
        None => println!("📦 Payload: <stream>"),
    }

    println!("🧭 Trace: {}", ctx.trace().join(" → "));

    if !ctx.side_channel().is_empty() {
        println!("🗂  Side channel:");
        let mut entries: Vec<_> = ctx.side_channel().iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        for (key, value) in entries {
            println!("   • {}: {}", key, value);
        }
    }

    if !ctx.side_channel().diagnostics().is_empty() {
        println!("⚠️  Diagnostics:");
        for diagnostic in ctx.side_channel().diagnostics() {
            println!("   • {}: {}", diagnostic.source, diagnostic.message);
        }
    }
}
