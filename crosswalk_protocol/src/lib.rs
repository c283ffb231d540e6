// crosswalk_protocol: wire protocol between the crossing simulation and the
// ingest server.
//
// The simulation writes one flat JSON object per line over a persistent TCP
// connection. This crate owns everything about that format and nothing about
// sockets or threads: the `crosswalk_ingest` crate drives it from its
// connection handlers, and `crosswalk_sim` uses the encoder to produce lines.
//
// Module overview:
// - `message.rs`:  `Message` / `MessageKind`, loose-field JSON parsing
//                  (`parse_message`) and line encoding (`encode_line`).
// - `framing.rs`:  `LineFramer`, a per-connection byte stream to record
//                  splitter with an optional record length cap.
// - `types.rs`:    `LightColor` (phase string to colour) and the reserved
//                  `RESET_ACTION` token.
//
// Design decisions:
// - **Parse, don't validate.** A well-formed object always parses; whether a
//   `State` message has an agent and coordinates is the consumer's call.
// - **Framing is byte-level.** Decoding happens per complete record so UTF-8
//   sequences split by TCP segmentation survive.

pub mod framing;
pub mod message;
pub mod types;

pub use framing::{FrameError, LineFramer};
pub use message::{Message, MessageKind, ParseError, encode_line, parse_message};
pub use types::{LightColor, RESET_ACTION};
