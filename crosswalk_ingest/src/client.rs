// TCP client for streaming messages into an ingest server.
//
// This is the producing side of the protocol, used by the `simulate` binary
// in `crosswalk_sim` and by the end-to-end tests. Architecture:
// - `connect_with_retry()` resolves the address, then tries to connect a
//   fixed number of times with a delay between attempts. The simulation is
//   usually started before the host application is listening, so the first
//   few attempts are expected to fail.
// - After connecting it reads the server's greeting line, waiting at most
//   the connect timeout. A server configured without a greeting just costs
//   that wait; it is not an error.
// - `send()` encodes one `Message` as a JSON line and flushes it, so every
//   message leaves the process as soon as it is produced.
//
// It lives in the ingest crate, next to the server it talks to, because it
// needs nothing beyond `std::net` and the protocol crate.

use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use crosswalk_protocol::{Message, encode_line};
use tracing::{debug, info};

use crate::error::ClientError;

/// Retry and timeout settings for `SimClient::connect_with_retry`.
#[derive(Clone, Debug)]
pub struct ConnectOptions {
    /// Total connection attempts (at least one is always made).
    pub attempts: u32,
    /// Pause between failed attempts.
    pub retry_delay: Duration,
    /// Per-attempt connect timeout; also bounds the greeting read and each
    /// write.
    pub timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            attempts: 30,
            retry_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(2),
        }
    }
}

/// Persistent connection that sends line-delimited messages.
pub struct SimClient {
    writer: BufWriter<TcpStream>,
    peer: SocketAddr,
    greeting: Option<String>,
    sent: u64,
}

impl SimClient {
    /// Connect once with default timeouts.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        Self::connect_with_retry(
            addr,
            &ConnectOptions {
                attempts: 1,
                ..ConnectOptions::default()
            },
        )
    }

    pub fn connect_with_retry(
        addr: impl ToSocketAddrs,
        options: &ConnectOptions,
    ) -> Result<Self, ClientError> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or(ClientError::NoAddress)?;
        let attempts = options.attempts.max(1);

        let mut attempt = 1;
        let stream = loop {
            match TcpStream::connect_timeout(&addr, options.timeout) {
                Ok(stream) => {
                    info!(%addr, attempt, "connected");
                    break stream;
                }
                Err(source) if attempt >= attempts => {
                    return Err(ClientError::Connect {
                        addr,
                        attempts,
                        source,
                    });
                }
                Err(e) => {
                    info!(
                        %addr,
                        attempt,
                        attempts,
                        error = %e,
                        "server not responding; retrying in {:?}",
                        options.retry_delay
                    );
                    thread::sleep(options.retry_delay);
                    attempt += 1;
                }
            }
        };

        stream.set_write_timeout(Some(options.timeout))?;
        let greeting = read_greeting(&stream, options.timeout)?;
        if let Some(greeting) = &greeting {
            debug!(greeting, "server greeting");
        }

        Ok(Self {
            writer: BufWriter::new(stream),
            peer: addr,
            greeting,
            sent: 0,
        })
    }

    /// Send one message as a JSON line.
    pub fn send(&mut self, msg: &Message) -> Result<(), ClientError> {
        let line = encode_line(msg)?;
        self.send_raw(line.as_bytes())?;
        self.sent += 1;
        debug!(line = line.trim_end(), "sent");
        Ok(())
    }

    /// Write bytes as-is and flush. No framing is added.
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
        self.writer.write_all(bytes)?;
        self.writer.flush()?;
        Ok(())
    }

    /// The greeting line the server sent, without its terminator.
    pub fn greeting(&self) -> Option<&str> {
        self.greeting.as_deref()
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Messages sent through `send` so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Flush and half-close the connection so the server sees EOF.
    pub fn close(mut self) -> Result<(), ClientError> {
        self.writer.flush()?;
        self.writer.get_ref().shutdown(Shutdown::Write)?;
        Ok(())
    }
}

/// Read one greeting line, giving up quietly after `timeout`.
fn read_greeting(stream: &TcpStream, timeout: Duration) -> Result<Option<String>, ClientError> {
    stream.set_read_timeout(Some(timeout))?;
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    let greeting = match reader.read_line(&mut line) {
        Ok(0) => None,
        Ok(_) => Some(line.trim_end().to_string()),
        Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => None,
        Err(e) => return Err(e.into()),
    };
    stream.set_read_timeout(None)?;
    Ok(greeting)
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::time::Instant;

    use super::*;
    use crate::config::{DEFAULT_GREETING, IngestConfig};
    use crate::inbox::Inbox;
    use crate::server::start_listener;

    /// A loopback address nothing is listening on.
    fn free_addr() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    }

    fn quick_options(attempts: u32) -> ConnectOptions {
        ConnectOptions {
            attempts,
            retry_delay: Duration::from_millis(50),
            timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn gives_up_after_all_attempts() {
        let addr = free_addr();
        match SimClient::connect_with_retry(addr, &quick_options(3)) {
            Err(ClientError::Connect {
                addr: failed,
                attempts,
                ..
            }) => {
                assert_eq!(failed, addr);
                assert_eq!(attempts, 3);
            }
            Err(other) => panic!("expected Connect error, got {other:?}"),
            Ok(_) => panic!("connected to {addr} with nothing listening"),
        }
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let addr = free_addr();
        let err = SimClient::connect_with_retry(addr, &quick_options(0)).err();
        assert!(
            matches!(err, Some(ClientError::Connect { attempts: 1, .. })),
            "got {err:?}"
        );
    }

    #[test]
    fn connects_once_server_comes_up() {
        let addr = free_addr();
        let config = IngestConfig {
            port: addr.port(),
            ..IngestConfig::loopback_ephemeral()
        };
        let inbox = Inbox::unbounded();
        let tx = inbox.sender();
        let server = thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            start_listener(&config, tx).unwrap().0
        });

        let started = Instant::now();
        let client = SimClient::connect_with_retry(addr, &quick_options(40)).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(client.greeting(), Some(DEFAULT_GREETING.trim_end()));
        assert_eq!(client.peer_addr(), addr);

        client.close().unwrap();
        assert!(server.join().unwrap().stop(Duration::from_secs(1)));
    }

    #[test]
    fn missing_greeting_is_not_an_error() {
        let config = IngestConfig {
            greeting: None,
            ..IngestConfig::loopback_ephemeral()
        };
        let mut inbox = Inbox::unbounded();
        let (handle, addr) = start_listener(&config, inbox.sender()).unwrap();

        let options = ConnectOptions {
            timeout: Duration::from_millis(100),
            ..quick_options(1)
        };
        let mut client = SimClient::connect_with_retry(addr, &options).unwrap();
        assert_eq!(client.greeting(), None);

        // The connection is still usable after the greeting read timed out.
        client.send(&Message::light("AMBER")).unwrap();
        assert_eq!(client.sent(), 1);
        let started = Instant::now();
        let mut received = Vec::new();
        while received.is_empty() {
            assert!(started.elapsed() < Duration::from_secs(5), "message never arrived");
            thread::sleep(Duration::from_millis(5));
            received = inbox.drain_all();
        }
        assert_eq!(received[0].light_state.as_deref(), Some("AMBER"));

        client.close().unwrap();
        assert!(handle.stop(Duration::from_secs(1)));
    }
}
