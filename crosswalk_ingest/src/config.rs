// Runtime configuration for the ingest server.
//
// `IngestConfig::default()` reproduces the deployed setup: all IPv4
// interfaces on port 5005, a one-line greeting, 4 KiB reads, no record
// length cap, an unbounded inbox, and a 200 ms wait for the accept thread at
// shutdown. The `ingest` binary overrides fields from its command line;
// tests bind `127.0.0.1` on port 0 and read the real port back from
// `start_listener`.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Port the simulation connects to unless told otherwise.
pub const DEFAULT_PORT: u16 = 5005;

/// Line written to every new connection before anything is read.
pub const DEFAULT_GREETING: &str = "hello from crosswalk\n";

/// What the inbox does when producers outrun the consumer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InboxPolicy {
    /// Grow without limit. Matches the deployed behaviour.
    Unbounded,
    /// Keep at most `n` messages; a push into a full inbox evicts the oldest.
    DropOldest(usize),
    /// Keep at most `n` messages; a push into a full inbox is refused.
    Reject(usize),
}

/// Configuration for `start_listener` / `IngestBridge::on_start`.
#[derive(Clone, Debug)]
pub struct IngestConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    /// Sent once per connection. `None` sends nothing.
    pub greeting: Option<String>,
    pub read_buffer_size: usize,
    /// Cap on a single record's length. `None` means unlimited.
    pub max_record_len: Option<usize>,
    pub inbox_policy: InboxPolicy,
    /// How often the non-blocking accept loop re-checks for connections and
    /// for shutdown.
    pub accept_poll_interval: Duration,
    /// Upper bound on waiting for the accept thread during shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            greeting: Some(DEFAULT_GREETING.into()),
            read_buffer_size: 4096,
            max_record_len: None,
            inbox_policy: InboxPolicy::Unbounded,
            accept_poll_interval: Duration::from_millis(20),
            shutdown_timeout: Duration::from_millis(200),
        }
    }
}

impl IngestConfig {
    /// Loopback on an OS-assigned port.
    pub fn loopback_ephemeral() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            ..Self::default()
        }
    }
}
