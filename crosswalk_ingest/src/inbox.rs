// Multi-producer, single-consumer message queue between connection handlers
// and the dispatch loop.
//
// `Inbox` is the consuming end and is not `Clone`; the
// dispatcher owns it. Producers get cheap `InboxSender` clones, one per
// connection handler. Both ends share a `parking_lot::Mutex<VecDeque>`: the
// lock is internal, so neither side ever handles it.
//
// `drain_all` swaps the entire queue out under a single lock acquisition.
// That gives snapshot semantics: everything pushed before the swap is
// returned, everything pushed after it waits for the next tick. Because
// each handler pushes from one thread in framing order, per-connection FIFO
// order survives into the drained batch; interleaving between connections
// is whatever order the pushes won the lock.
//
// Capacity follows `InboxPolicy`. The default is unbounded, so a consumer
// that stops ticking lets the queue grow without limit. The bounded policies
// trade that for dropped messages, counted in `InboxStats::dropped`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crosswalk_protocol::Message;
use parking_lot::Mutex;

use crate::config::InboxPolicy;

/// Result of a single push.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Enqueued {
    Accepted,
    /// Accepted after evicting the oldest queued message.
    EvictedOldest,
    /// Refused because the inbox was full.
    Rejected,
}

/// Counters since the inbox was created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InboxStats {
    pub accepted: u64,
    pub dropped: u64,
}

struct Shared {
    queue: Mutex<VecDeque<Message>>,
    policy: InboxPolicy,
    accepted: AtomicU64,
    dropped: AtomicU64,
}

/// Consuming end of the queue.
pub struct Inbox {
    shared: Arc<Shared>,
}

/// Producing end of the queue. Clone one per producer thread.
#[derive(Clone)]
pub struct InboxSender {
    shared: Arc<Shared>,
}

impl Inbox {
    pub fn new(policy: InboxPolicy) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::new()),
                policy,
                accepted: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(InboxPolicy::Unbounded)
    }

    pub fn sender(&self) -> InboxSender {
        InboxSender {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Remove and return everything queued right now, oldest first. Never
    /// waits for new messages.
    pub fn drain_all(&mut self) -> Vec<Message> {
        let batch = std::mem::take(&mut *self.shared.queue.lock());
        batch.into()
    }

    pub fn len(&self) -> usize {
        self.shared.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> InboxStats {
        InboxStats {
            accepted: self.shared.accepted.load(Ordering::Relaxed),
            dropped: self.shared.dropped.load(Ordering::Relaxed),
        }
    }
}

impl InboxSender {
    /// Queue one message. Never blocks beyond the brief internal lock.
    pub fn push(&self, msg: Message) -> Enqueued {
        let shared = &*self.shared;
        let mut queue = shared.queue.lock();
        let outcome = match shared.policy {
            InboxPolicy::Unbounded => Enqueued::Accepted,
            InboxPolicy::DropOldest(cap) if cap > 0 && queue.len() >= cap => {
                queue.pop_front();
                shared.dropped.fetch_add(1, Ordering::Relaxed);
                Enqueued::EvictedOldest
            }
            InboxPolicy::DropOldest(cap) | InboxPolicy::Reject(cap) if queue.len() >= cap => {
                shared.dropped.fetch_add(1, Ordering::Relaxed);
                return Enqueued::Rejected;
            }
            InboxPolicy::DropOldest(_) | InboxPolicy::Reject(_) => Enqueued::Accepted,
        };
        queue.push_back(msg);
        shared.accepted.fetch_add(1, Ordering::Relaxed);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::thread;

    use super::*;

    fn numbered(producer: &str, n: i64) -> Message {
        Message::state(producer, 0.0, 0.0).with_step(n)
    }

    fn steps(batch: &[Message]) -> Vec<i64> {
        batch.iter().filter_map(|m| m.step).collect()
    }

    #[test]
    fn drain_returns_fifo_and_empties() {
        let mut inbox = Inbox::unbounded();
        let tx = inbox.sender();
        for i in 0..5 {
            assert_eq!(tx.push(numbered("a", i)), Enqueued::Accepted);
        }
        assert_eq!(inbox.len(), 5);
        assert_eq!(steps(&inbox.drain_all()), vec![0, 1, 2, 3, 4]);
        assert!(inbox.is_empty());
        assert!(inbox.drain_all().is_empty());
    }

    #[test]
    fn pushes_after_drain_wait_for_next_drain() {
        let mut inbox = Inbox::unbounded();
        let tx = inbox.sender();
        tx.push(numbered("a", 1));
        let first = inbox.drain_all();
        tx.push(numbered("a", 2));
        assert_eq!(steps(&first), vec![1]);
        assert_eq!(steps(&inbox.drain_all()), vec![2]);
    }

    #[test]
    fn drop_oldest_keeps_newest() {
        let mut inbox = Inbox::new(InboxPolicy::DropOldest(3));
        let tx = inbox.sender();
        let outcomes: Vec<Enqueued> = (0..5).map(|i| tx.push(numbered("a", i))).collect();
        assert_eq!(
            outcomes,
            vec![
                Enqueued::Accepted,
                Enqueued::Accepted,
                Enqueued::Accepted,
                Enqueued::EvictedOldest,
                Enqueued::EvictedOldest,
            ]
        );
        assert_eq!(steps(&inbox.drain_all()), vec![2, 3, 4]);
        assert_eq!(
            inbox.stats(),
            InboxStats {
                accepted: 5,
                dropped: 2
            }
        );
    }

    #[test]
    fn reject_keeps_oldest() {
        let mut inbox = Inbox::new(InboxPolicy::Reject(2));
        let tx = inbox.sender();
        for i in 0..4 {
            tx.push(numbered("a", i));
        }
        assert_eq!(steps(&inbox.drain_all()), vec![0, 1]);
        assert_eq!(inbox.stats().dropped, 2);
        // Space freed by the drain is usable again.
        assert_eq!(tx.push(numbered("a", 9)), Enqueued::Accepted);
    }

    #[test]
    fn zero_capacity_refuses_everything() {
        let mut inbox = Inbox::new(InboxPolicy::DropOldest(0));
        assert_eq!(inbox.sender().push(numbered("a", 0)), Enqueued::Rejected);
        assert!(inbox.drain_all().is_empty());
    }

    #[test]
    fn unbounded_push_never_refuses() {
        let mut inbox = Inbox::unbounded();
        let tx = inbox.sender();
        for i in 0..50_000 {
            assert_eq!(tx.push(numbered("a", i)), Enqueued::Accepted);
        }
        assert_eq!(inbox.drain_all().len(), 50_000);
    }

    #[test]
    fn concurrent_producers_keep_their_own_order() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: i64 = 2_000;

        let mut inbox = Inbox::unbounded();
        let handles: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let tx = inbox.sender();
                thread::spawn(move || {
                    let name = format!("producer_{p}");
                    for i in 0..PER_PRODUCER {
                        tx.push(numbered(&name, i));
                    }
                })
            })
            .collect();

        // Drain while producers are still running, like a tick loop would.
        let mut seen: BTreeMap<String, Vec<i64>> = BTreeMap::new();
        let mut record = |batch: Vec<Message>| {
            for msg in batch {
                seen.entry(msg.agent_id.unwrap())
                    .or_default()
                    .push(msg.step.unwrap());
            }
        };
        while handles.iter().any(|h| !h.is_finished()) {
            record(inbox.drain_all());
            thread::yield_now();
        }
        for handle in handles {
            handle.join().unwrap();
        }
        record(inbox.drain_all());

        assert_eq!(seen.len(), PRODUCERS);
        let expected: Vec<i64> = (0..PER_PRODUCER).collect();
        for (producer, order) in &seen {
            assert_eq!(order, &expected, "{producer} out of order");
        }
    }
}
