// CLI entry point for the crossing simulation.
//
// Connects to an ingest server (retrying while it starts up), sends the
// agents' starting positions, then runs the model and streams every step's
// messages, pausing `step_delay` between steps so a host can watch in real
// time.
//
// Usage:
//   simulate [OPTIONS]
//     --addr <HOST:PORT>         Ingest server (default: 127.0.0.1:5005)
//     --params <PATH>            JSON file overriding simulation parameters
//     --steps <N>                Override the number of steps
//     --step-delay-ms <MS>       Override the pause between steps
//     --connect-attempts <N>     Connection attempts (default: 30)
//     --retry-delay-ms <MS>      Pause between attempts (default: 1000)

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use crosswalk_ingest::{ConnectOptions, SimClient};
use crosswalk_sim::{CrossModel, SimParams};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "simulate", about = "Stream the crossing simulation to an ingest server")]
struct Args {
    #[arg(long, default_value = "127.0.0.1:5005")]
    addr: String,

    #[arg(long)]
    params: Option<PathBuf>,

    #[arg(long)]
    steps: Option<u64>,

    #[arg(long)]
    step_delay_ms: Option<u64>,

    #[arg(long, default_value_t = 30)]
    connect_attempts: u32,

    #[arg(long, default_value_t = 1000)]
    retry_delay_ms: u64,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut params = match &args.params {
        Some(path) => SimParams::load(path)?,
        None => SimParams::default(),
    };
    if let Some(steps) = args.steps {
        params.steps = steps;
    }
    let step_delay = match args.step_delay_ms {
        Some(ms) => Duration::from_millis(ms),
        None => Duration::try_from_secs_f64(params.step_delay)
            .context("step_delay must be a non-negative number of seconds")?,
    };

    let options = ConnectOptions {
        attempts: args.connect_attempts,
        retry_delay: Duration::from_millis(args.retry_delay_ms),
        ..ConnectOptions::default()
    };
    let mut client = SimClient::connect_with_retry(args.addr.as_str(), &options)
        .with_context(|| format!("could not reach ingest server at {}", args.addr))?;

    let mut model = CrossModel::new(params);
    for msg in model.initial_messages() {
        client.send(&msg)?;
    }

    info!(steps = model.params().steps, ?step_delay, "simulation started");
    while !model.is_finished() {
        for msg in model.step() {
            client.send(&msg)?;
        }
        thread::sleep(step_delay);
    }

    info!(sent = client.sent(), "simulation finished");
    client.close()?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
