// CLI entry point for the crosswalk ingest server.
//
// Listens for the crossing simulation, applies its messages to an in-memory
// scene (a car, a pedestrian, and a traffic light) on a fixed-rate tick
// loop, and logs every entity whose position or colour changed during a
// tick. Stands in for the real host application when running headless.
//
// Usage:
//   ingest [OPTIONS]
//     --port <PORT>              Listen port (default: 5005)
//     --bind <ADDR>              Bind address (default: 0.0.0.0)
//     --tick-ms <MS>             Tick period (default: 16)
//     --greeting <TEXT>          Greeting line sent to each client
//     --no-greeting              Send no greeting
//     --max-record-len <BYTES>   Drop records longer than this
//     --inbox-capacity <N>       Bound the inbox (default: unbounded)
//     --overflow <POLICY>        drop-oldest | reject (with --inbox-capacity)
//     --run-for-secs <SECS>      Shut down after this long (default: run
//                                until killed)
//
// Logging goes through `tracing`; set `RUST_LOG` (e.g. `RUST_LOG=debug`) to
// see every received line.

use std::net::IpAddr;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use crosswalk_ingest::{
    DEFAULT_GREETING, DEFAULT_PORT, Entity, InboxPolicy, IngestBridge, IngestConfig, Scene,
    SceneSink,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Overflow {
    DropOldest,
    Reject,
}

#[derive(Debug, Parser)]
#[command(name = "ingest", about = "Receive crossing-simulation messages over TCP")]
struct Args {
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    #[arg(long, default_value_t = 16)]
    tick_ms: u64,

    #[arg(long, conflicts_with = "no_greeting")]
    greeting: Option<String>,

    #[arg(long)]
    no_greeting: bool,

    #[arg(long)]
    max_record_len: Option<usize>,

    #[arg(long)]
    inbox_capacity: Option<usize>,

    #[arg(long, value_enum, default_value_t = Overflow::DropOldest)]
    overflow: Overflow,

    #[arg(long)]
    run_for_secs: Option<u64>,
}

impl Args {
    fn to_config(&self) -> IngestConfig {
        let greeting = if self.no_greeting {
            None
        } else {
            let mut text = self
                .greeting
                .clone()
                .unwrap_or_else(|| DEFAULT_GREETING.into());
            if !text.ends_with('\n') {
                text.push('\n');
            }
            Some(text)
        };
        let inbox_policy = match (self.inbox_capacity, self.overflow) {
            (None, _) => InboxPolicy::Unbounded,
            (Some(n), Overflow::DropOldest) => InboxPolicy::DropOldest(n),
            (Some(n), Overflow::Reject) => InboxPolicy::Reject(n),
        };
        IngestConfig {
            bind_addr: self.bind,
            port: self.port,
            greeting,
            max_record_len: self.max_record_len,
            inbox_policy,
            ..IngestConfig::default()
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut bridge = IngestBridge::new(args.to_config());
    let addr = bridge.on_start().context("failed to start ingest server")?;
    info!(%addr, "waiting for the simulation");

    let mut sink = SceneSink::new(Scene::crossing());
    let mut previous = snapshot(sink.world());
    let tick = Duration::from_millis(args.tick_ms.max(1));
    let deadline = args
        .run_for_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));

    loop {
        let started = Instant::now();
        if bridge.on_tick(&mut sink) > 0 {
            let current = snapshot(sink.world());
            log_changes(&previous, &current);
            previous = current;
        }
        if deadline.is_some_and(|d| started >= d) {
            break;
        }
        thread::sleep(tick.saturating_sub(started.elapsed()));
    }

    bridge.on_shutdown();
    let stats = bridge.inbox_stats();
    info!(
        dispatched = bridge.dispatched(),
        dropped = stats.dropped,
        "ingest finished"
    );
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn snapshot(scene: &Scene) -> Vec<(String, Entity)> {
    scene
        .iter()
        .map(|(name, entity)| (name.to_string(), entity.clone()))
        .collect()
}

fn log_changes(previous: &[(String, Entity)], current: &[(String, Entity)]) {
    for ((name, before), (_, after)) in previous.iter().zip(current) {
        if before == after {
            continue;
        }
        let p = after.position;
        match after.color {
            Some(color) => info!(entity = %name, %color, "light changed"),
            None => info!(entity = %name, x = p.x, y = p.y, z = p.z, "moved"),
        }
    }
}
