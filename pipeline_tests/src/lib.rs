// Test-only host for end-to-end pipeline tests.
//
// `TestHost` plays the part of the frame-driven host application: it owns a
// real `IngestBridge` bound to an ephemeral loopback port and a `SceneSink`
// over the in-memory crossing `Scene`, and exposes blocking wrappers that
// tick the bridge until some condition holds. Senders are real `SimClient`s
// driven by a real `CrossModel`.
//
// The only test-specific code here is the polling loops. Networking,
// framing, parsing, dispatch, and scene updates all run through the same
// code paths as the `ingest` and `simulate` binaries.
//
// See also: `tests/full_pipeline.rs` for the scenarios.

use std::net::SocketAddr;
use std::thread;
use std::time::{Duration, Instant};

use crosswalk_ingest::{
    ConnectOptions, Entity, IngestBridge, IngestConfig, Scene, SceneSink, SimClient,
};
use crosswalk_protocol::LightColor;
use crosswalk_sim::CrossModel;

/// Default timeout for blocking poll operations.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep between ticks while polling.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// A host with a running ingest server and a crossing scene.
pub struct TestHost {
    pub bridge: IngestBridge,
    pub sink: SceneSink<Scene>,
    pub addr: SocketAddr,
    dispatched: usize,
}

impl TestHost {
    pub fn start() -> Self {
        Self::start_with(IngestConfig::loopback_ephemeral())
    }

    pub fn start_with(config: IngestConfig) -> Self {
        let mut bridge = IngestBridge::new(config);
        let addr = bridge.on_start().expect("TestHost::start failed");
        Self {
            bridge,
            sink: SceneSink::new(Scene::crossing()),
            addr,
            dispatched: 0,
        }
    }

    /// Connect a client with short timeouts.
    pub fn connect(&self) -> SimClient {
        let options = ConnectOptions {
            attempts: 5,
            retry_delay: Duration::from_millis(20),
            timeout: Duration::from_millis(500),
        };
        SimClient::connect_with_retry(self.addr, &options).expect("SimClient connect failed")
    }

    /// One host tick. Returns the number of messages dispatched.
    pub fn tick(&mut self) -> usize {
        let n = self.bridge.on_tick(&mut self.sink);
        self.dispatched += n;
        n
    }

    /// Messages dispatched through this host so far.
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Tick until `total` messages have been dispatched in all.
    pub fn tick_until_dispatched(&mut self, total: usize) {
        let start = Instant::now();
        while self.dispatched < total {
            assert!(
                start.elapsed() < POLL_TIMEOUT,
                "timed out: dispatched {} of {total}",
                self.dispatched
            );
            if self.tick() == 0 {
                thread::sleep(POLL_INTERVAL);
            }
        }
    }

    /// Tick until the predicate holds for the scene.
    pub fn tick_until(&mut self, what: &str, mut done: impl FnMut(&Scene) -> bool) {
        let start = Instant::now();
        loop {
            self.tick();
            if done(self.sink.world()) {
                return;
            }
            assert!(start.elapsed() < POLL_TIMEOUT, "timed out waiting for {what}");
            thread::sleep(POLL_INTERVAL);
        }
    }

    pub fn entity(&self, name: &str) -> &Entity {
        self.sink
            .world()
            .get(name)
            .unwrap_or_else(|| panic!("no entity named {name}"))
    }

    pub fn light(&self) -> Option<LightColor> {
        self.entity(crosswalk_ingest::TRAFFIC_LIGHT).color
    }

    pub fn shutdown(mut self) -> bool {
        self.bridge.on_shutdown()
    }
}

/// Send a model's initial messages and then `steps` steps. Returns the
/// number of messages sent.
pub fn stream_model(client: &mut SimClient, model: &mut CrossModel, steps: usize) -> usize {
    let mut sent = 0;
    for msg in model.initial_messages() {
        client.send(&msg).expect("send failed");
        sent += 1;
    }
    for _ in 0..steps {
        for msg in model.step() {
            client.send(&msg).expect("send failed");
            sent += 1;
        }
    }
    sent
}
