// Host integration: the three lifecycle hooks a frame-driven host calls.
//
// `IngestBridge` bundles the listener and the dispatcher behind the calls a
// game loop (or the `ingest` binary's timer loop) makes:
// - `on_start`:    bind and start accepting (once; again only after a stop),
// - `on_tick`:     one dispatch cycle against the host's sink,
// - `on_shutdown`: stop accepting and wait, bounded, for the accept thread.
//
// The inbox outlives listener restarts: messages queued before a shutdown
// are still delivered by the next `on_tick`.

use std::net::SocketAddr;

use tracing::{info, warn};

use crate::config::IngestConfig;
use crate::dispatch::{Dispatcher, Sink};
use crate::error::IngestError;
use crate::inbox::{Inbox, InboxStats};
use crate::server::{ListenerHandle, start_listener};

pub struct IngestBridge {
    config: IngestConfig,
    dispatcher: Dispatcher,
    listener: Option<ListenerHandle>,
}

impl IngestBridge {
    pub fn new(config: IngestConfig) -> Self {
        let dispatcher = Dispatcher::new(Inbox::new(config.inbox_policy));
        Self {
            config,
            dispatcher,
            listener: None,
        }
    }

    /// Begin listening. Returns the bound address.
    pub fn on_start(&mut self) -> Result<SocketAddr, IngestError> {
        if self.listener.is_some() {
            return Err(IngestError::AlreadyStarted);
        }
        let (handle, addr) = start_listener(&self.config, self.dispatcher.sender())?;
        self.listener = Some(handle);
        Ok(addr)
    }

    /// Deliver everything queued since the last tick. Never blocks.
    pub fn on_tick<S: Sink + ?Sized>(&mut self, sink: &mut S) -> usize {
        self.dispatcher.tick(sink)
    }

    /// Stop listening. Returns whether the accept thread finished within the
    /// configured timeout; shutdown proceeds either way.
    pub fn on_shutdown(&mut self) -> bool {
        let Some(listener) = self.listener.take() else {
            return true;
        };
        let joined = listener.stop(self.config.shutdown_timeout);
        if joined {
            info!("ingest stopped");
        } else {
            warn!(
                timeout = ?self.config.shutdown_timeout,
                "accept thread did not stop in time; continuing shutdown"
            );
        }
        joined
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().map(ListenerHandle::local_addr)
    }

    pub fn is_listening(&self) -> bool {
        self.listener.is_some()
    }

    pub fn live_connections(&self) -> usize {
        self.listener
            .as_ref()
            .map_or(0, ListenerHandle::live_connections)
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatcher.dispatched()
    }

    pub fn inbox_stats(&self) -> InboxStats {
        self.dispatcher.inbox_stats()
    }
}
