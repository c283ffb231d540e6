// Error types for the ingest server and the sender client.
//
// Only startup failures surface to callers of the server: once the listener
// is running, accept and read problems are logged and absorbed on the
// thread where they happen (see `server.rs`). Parse and framing failures
// never leave the connection handler at all, so they have no variant here.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("listener setup failed: {0}")]
    Io(#[from] io::Error),
    #[error("ingest is already running")]
    AlreadyStarted,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not connect to {addr} after {attempts} attempts: {source}")]
    Connect {
        addr: SocketAddr,
        attempts: u32,
        #[source]
        source: io::Error,
    },
    #[error("no address to connect to")]
    NoAddress,
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
