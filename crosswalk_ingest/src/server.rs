// TCP listener and per-connection reader threads.
//
// Architecture: thread-per-connection feeding a shared inbox.
//
// - **Accept thread** (`accept_loop`): owns the `TcpListener`, which is set
//   non-blocking and polled every `accept_poll_interval`. Between polls it
//   checks the shutdown flag, so `ListenerHandle::stop` makes a pending
//   accept return promptly without relying on platform-specific socket
//   shutdown semantics. Each accepted stream gets its own handler thread;
//   the accept loop never waits on handler work.
// - **Connection threads** (`serve_connection`): write the greeting, then
//   loop on bounded `read()` calls. Each chunk goes into the connection's
//   `LineFramer`; every complete record is trimmed, blank records skipped,
//   the rest parsed and pushed to the inbox. A record that fails to parse
//   is logged and dropped and the connection carries on. EOF, a read error
//   or an observed shutdown ends the connection. The stream is owned by the
//   thread, so it is closed on every exit path, unwinding included.
//
// Accept errors: a peer aborting its handshake or a momentary shortage of
// memory or descriptors is logged and retried after a poll interval. Any
// other error means the listening socket itself is unusable, so the accept
// loop logs it and exits; live connections are unaffected.
//
// Shutdown: `stop` sets the shared flag and waits (bounded) for the accept
// thread, which drops the listening socket on its way out. Connection
// threads are not interrupted mid-read; they see the flag after their next
// read completes and exit then, or exit earlier on EOF. Nothing waits for
// them.
//
// Failure isolation: nothing that happens inside one connection thread
// reaches another connection, the accept thread, or the consumer.

use std::io::{self, ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crosswalk_protocol::{LineFramer, parse_message};
use tracing::{debug, error, info, info_span, warn};

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::inbox::{Enqueued, InboxSender};

/// Handle to a running listener. Dropping it requests shutdown without
/// waiting; `stop` requests shutdown and waits.
pub struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    live: Arc<AtomicUsize>,
    accept_thread: Option<JoinHandle<()>>,
    local_addr: SocketAddr,
}

impl ListenerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Connection threads currently running.
    pub fn live_connections(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Close the listening socket and wait up to `timeout` for the accept
    /// thread. Returns whether it finished in time; if not, it is left to
    /// exit on its own.
    pub fn stop(mut self, timeout: Duration) -> bool {
        self.shutdown.store(true, Ordering::SeqCst);
        match self.accept_thread.take() {
            Some(handle) => join_with_timeout(handle, timeout),
            None => true,
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

/// What every connection thread needs, cloned per accept.
#[derive(Clone)]
struct ConnectionContext {
    inbox: InboxSender,
    greeting: Option<Arc<str>>,
    read_buffer_size: usize,
    max_record_len: Option<usize>,
    shutdown: Arc<AtomicBool>,
    live: Arc<AtomicUsize>,
}

/// Why a connection ended.
#[derive(Debug)]
enum Closed {
    PeerClosed,
    ReadFailed(io::Error),
    GreetingFailed(io::Error),
    Shutdown,
}

/// Bind the listening socket and start the accept thread. Returns the handle
/// and the bound address (which differs from the configured one when port 0
/// was requested).
pub fn start_listener(
    config: &IngestConfig,
    inbox: InboxSender,
) -> Result<(ListenerHandle, SocketAddr), IngestError> {
    let addr = SocketAddr::new(config.bind_addr, config.port);
    let listener = TcpListener::bind(addr).map_err(|source| IngestError::Bind { addr, source })?;
    let local_addr = listener.local_addr()?;
    listener.set_nonblocking(true)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let live = Arc::new(AtomicUsize::new(0));
    let ctx = ConnectionContext {
        inbox,
        greeting: config.greeting.as_deref().map(Arc::from),
        read_buffer_size: config.read_buffer_size.max(1),
        max_record_len: config.max_record_len,
        shutdown: Arc::clone(&shutdown),
        live: Arc::clone(&live),
    };
    let poll_interval = config.accept_poll_interval;

    let accept_thread = thread::Builder::new()
        .name("ingest-accept".into())
        .spawn(move || accept_loop(listener, ctx, poll_interval))?;

    info!(%local_addr, "listening");
    Ok((
        ListenerHandle {
            shutdown,
            live,
            accept_thread: Some(accept_thread),
            local_addr,
        },
        local_addr,
    ))
}

fn accept_loop(listener: TcpListener, ctx: ConnectionContext, poll_interval: Duration) {
    let mut next_id: u64 = 0;
    while !ctx.shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                next_id += 1;
                spawn_connection(stream, peer, next_id, ctx.clone());
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(poll_interval),
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                if ctx.shutdown.load(Ordering::SeqCst) {
                    break;
                }
                if !is_transient_accept_error(&e) {
                    error!(error = %e, "listening socket failed; no longer accepting");
                    break;
                }
                warn!(error = %e, "accept failed; retrying");
                thread::sleep(poll_interval);
            }
        }
    }
    drop(listener);
    info!("listener closed");
}

/// Accept errors after which the listening socket is still usable: a peer
/// that went away during the handshake, or a momentary shortage of memory or
/// file descriptors.
fn is_transient_accept_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset
            | ErrorKind::TimedOut
            | ErrorKind::OutOfMemory
    ) || is_descriptor_exhaustion(e)
}

#[cfg(unix)]
fn is_descriptor_exhaustion(e: &io::Error) -> bool {
    // ENFILE and EMFILE share these values across Linux, macOS and the BSDs.
    const ENFILE: i32 = 23;
    const EMFILE: i32 = 24;
    matches!(e.raw_os_error(), Some(ENFILE | EMFILE))
}

#[cfg(not(unix))]
fn is_descriptor_exhaustion(_e: &io::Error) -> bool {
    false
}

fn spawn_connection(stream: TcpStream, peer: SocketAddr, id: u64, ctx: ConnectionContext) {
    // Accepted sockets may inherit the listener's non-blocking mode.
    if let Err(e) = stream.set_nonblocking(false) {
        warn!(%peer, error = %e, "could not configure accepted socket; dropping it");
        return;
    }
    let spawned = thread::Builder::new()
        .name(format!("ingest-conn-{id}"))
        .spawn(move || run_connection(stream, peer, id, ctx));
    if let Err(e) = spawned {
        warn!(%peer, error = %e, "could not spawn connection thread; dropping connection");
    }
}

/// Keeps `ListenerHandle::live_connections` accurate, including when the
/// connection thread unwinds.
struct LiveConnection(Arc<AtomicUsize>);

impl LiveConnection {
    fn register(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for LiveConnection {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn run_connection(mut stream: TcpStream, peer: SocketAddr, id: u64, ctx: ConnectionContext) {
    let _live = LiveConnection::register(&ctx.live);
    let span = info_span!("conn", id, %peer);
    let _enter = span.enter();

    info!("client connected");
    match serve_connection(&mut stream, &ctx) {
        Closed::PeerClosed => info!("client disconnected"),
        Closed::Shutdown => info!("closing connection for shutdown"),
        Closed::ReadFailed(e) => info!(error = %e, "client disconnected after read error"),
        Closed::GreetingFailed(e) => info!(error = %e, "could not send greeting; closing"),
    }
}

fn serve_connection(stream: &mut TcpStream, ctx: &ConnectionContext) -> Closed {
    let greeted = match &ctx.greeting {
        Some(greeting) => stream.write_all(greeting.as_bytes()),
        None => Ok(()),
    };
    if let Err(e) = greeted {
        return Closed::GreetingFailed(e);
    }

    let mut framer = match ctx.max_record_len {
        Some(max) => LineFramer::with_max_record_len(max),
        None => LineFramer::new(),
    };
    let mut buf = vec![0u8; ctx.read_buffer_size];

    loop {
        if ctx.shutdown.load(Ordering::SeqCst) {
            return Closed::Shutdown;
        }
        let n = match stream.read(&mut buf) {
            Ok(0) => return Closed::PeerClosed,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Closed::ReadFailed(e),
        };

        if let Err(e) = framer.feed(&buf[..n]) {
            warn!(error = %e, "dropping oversized record");
        }
        while let Some(record) = framer.next_record() {
            handle_record(&record, &ctx.inbox);
        }
    }
}

fn handle_record(record: &str, inbox: &InboxSender) {
    let line = record.trim();
    if line.is_empty() {
        return;
    }
    debug!(line, "received");

    match parse_message(line) {
        Ok(msg) => match inbox.push(msg) {
            Enqueued::Accepted => {}
            Enqueued::EvictedOldest => debug!("inbox full; evicted oldest message"),
            Enqueued::Rejected => warn!("inbox full; message rejected"),
        },
        Err(e) => warn!(error = %e, line, "dropping unparsable record"),
    }
}

/// `JoinHandle::join` with an upper bound. A thread still running at the
/// deadline is detached.
fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(2));
    }
    handle.join().is_ok()
}
