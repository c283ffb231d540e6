// crosswalk_ingest: network ingestion for crossing-simulation messages.
//
// An external simulation connects over TCP and streams line-delimited JSON
// messages (agent positions, traffic light phases). This crate accepts
// those connections, frames and parses the streams on background threads,
// and hands the decoded messages to a single consumer that runs once per
// host tick without ever blocking on the network.
//
// Data flow:
//   socket -> accept thread -> connection thread (read, frame, parse)
//          -> Inbox -> Dispatcher::tick (host thread) -> Sink
//
// Module overview:
// - `config.rs`:   `IngestConfig` (port, greeting, buffer sizes, inbox
//                  policy, timeouts) and its deployed defaults.
// - `server.rs`:   Listener and per-connection reader threads;
//                  `start_listener` returns a `ListenerHandle`.
// - `inbox.rs`:    `Inbox` / `InboxSender`, an internally locked MPSC queue
//                  with snapshot `drain_all`.
// - `dispatch.rs`: `Dispatcher` (one drain per tick) and the `Sink` trait
//                  with its message routing.
// - `scene.rs`:    `World` capability trait, `SceneSink`, and the in-memory
//                  `Scene` the binary and tests use.
// - `bridge.rs`:   `IngestBridge`, with `on_start` / `on_tick` / `on_shutdown`
//                  hooks for a frame-driven host.
// - `client.rs`:   `SimClient`, the sending side, with connect retries.
// - `error.rs`:    `IngestError`, `ClientError`.
//
// Dependencies: `crosswalk_protocol` for messages and framing. Threads and
// sockets are plain `std`; there is no async runtime.

pub mod bridge;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod inbox;
pub mod scene;
pub mod server;

pub use bridge::IngestBridge;
pub use client::{ConnectOptions, SimClient};
pub use config::{DEFAULT_GREETING, DEFAULT_PORT, InboxPolicy, IngestConfig};
pub use dispatch::{Dispatcher, Sink, StateUpdate};
pub use error::{ClientError, IngestError};
pub use inbox::{Enqueued, Inbox, InboxSender, InboxStats};
pub use scene::{Entity, EntityId, Scene, SceneSink, TRAFFIC_LIGHT, Vec3, World};
pub use server::{ListenerHandle, start_listener};
