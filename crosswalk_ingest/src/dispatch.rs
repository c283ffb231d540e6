// The per-tick dispatch loop and the sink interface it drives.
//
// The host calls `Dispatcher::tick` once per frame on its own thread. A tick
// drains the inbox snapshot and hands each message, in drained order, to
// `Sink::dispatch` exactly once. A tick with nothing queued returns
// immediately; nothing here ever waits on the network.
//
// `Sink` is the boundary to whatever owns the application state. Implementors
// provide the two effects (`apply_state`, `apply_light`); the provided
// `dispatch` method decides which one a message maps to and drops messages
// that cannot be acted on:
// - `state` without a non-empty `agent_id`, or without both coordinates,
// - `light` without a `state`,
// - any other `type`.
// Dropped messages are logged at debug level only. The sink runs on the
// tick thread, so it is never called concurrently.
//
// See also: `scene.rs` for the scene-graph sink used by the binary and the
// end-to-end tests.

use crosswalk_protocol::{Message, MessageKind};
use tracing::{debug, trace};

use crate::inbox::{Inbox, InboxSender, InboxStats};

/// Arguments of a position update, borrowed from the message being applied.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StateUpdate<'a> {
    pub agent_id: &'a str,
    pub x: f64,
    pub z: f64,
    pub action: Option<&'a str>,
    pub step: Option<i64>,
}

/// Consumer of decoded messages. Best effort: implementors swallow their own
/// lookup failures.
pub trait Sink {
    fn apply_state(&mut self, update: StateUpdate<'_>);

    fn apply_light(&mut self, state: &str);

    /// Route one message to the matching effect.
    fn dispatch(&mut self, msg: Message) {
        match &msg.kind {
            MessageKind::State => {
                let agent_id = msg.agent_id.as_deref().filter(|id| !id.is_empty());
                match (agent_id, msg.x, msg.z) {
                    (Some(agent_id), Some(x), Some(z)) => self.apply_state(StateUpdate {
                        agent_id,
                        x,
                        z,
                        action: msg.action.as_deref(),
                        step: msg.step,
                    }),
                    _ => debug!(?msg, "incomplete state message ignored"),
                }
            }
            MessageKind::Light => match msg.light_state.as_deref() {
                Some(state) => self.apply_light(state),
                None => debug!(?msg, "light message without state ignored"),
            },
            MessageKind::Unknown(tag) => debug!(?tag, "message of unknown type ignored"),
        }
    }
}

/// Owns the consuming end of the inbox and runs one drain per host tick.
pub struct Dispatcher {
    inbox: Inbox,
    dispatched: u64,
}

impl Dispatcher {
    pub fn new(inbox: Inbox) -> Self {
        Self {
            inbox,
            dispatched: 0,
        }
    }

    /// A producer handle for the inbox this dispatcher drains.
    pub fn sender(&self) -> InboxSender {
        self.inbox.sender()
    }

    /// Run one dispatch cycle. Returns how many messages were handed to
    /// `sink`.
    pub fn tick<S: Sink + ?Sized>(&mut self, sink: &mut S) -> usize {
        let batch = self.inbox.drain_all();
        let count = batch.len();
        for msg in batch {
            sink.dispatch(msg);
        }
        if count > 0 {
            self.dispatched += count as u64;
            trace!(count, total = self.dispatched, "dispatched batch");
        }
        count
    }

    /// Total messages dispatched since construction.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    pub fn inbox_stats(&self) -> InboxStats {
        self.inbox.stats()
    }
}
