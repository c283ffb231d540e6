// Control messages sent by the crossing simulation.
//
// One `Message` corresponds to one JSON object on the wire (see
// `framing.rs` for how the byte stream is cut into records). The wire schema
// is a flat object with every field optional:
//
//   {"type":"state","agent_id":"car_1","x":1.5,"z":2.0,"action":"AVANZA","step":3}
//   {"type":"light","state":"AMBER","step":4}
//
// Parsing is loose about *presence*: a missing field becomes
// `None`, unknown fields are ignored, and an unrecognized `type` tag becomes
// `MessageKind::Unknown`. It is strict about *shape*: text that is not JSON,
// JSON that is not an object, or a known field holding the wrong JSON type
// yields a `ParseError`. Whether a `State` message has enough fields to act
// on is decided by the consumer, not here.
//
// `encode_line` is the inverse used by senders: absent fields are omitted
// and the output carries its `\n` terminator.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::RESET_ACTION;

/// Which effect a message asks for.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Agent position update (`"type":"state"`).
    State,
    /// Traffic light phase change (`"type":"light"`).
    Light,
    /// Any other tag, or `None` when `type` was absent.
    Unknown(Option<String>),
}

impl MessageKind {
    fn from_tag(tag: Option<String>) -> Self {
        match tag.as_deref() {
            Some("state") => MessageKind::State,
            Some("light") => MessageKind::Light,
            _ => MessageKind::Unknown(tag),
        }
    }

    /// The wire tag for this kind, if it has one.
    pub fn tag(&self) -> Option<&str> {
        match self {
            MessageKind::State => Some("state"),
            MessageKind::Light => Some("light"),
            MessageKind::Unknown(tag) => tag.as_deref(),
        }
    }
}

/// One decoded control record. Built once from a complete line and handed
/// over by value; nothing mutates it after parsing.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub kind: MessageKind,
    pub agent_id: Option<String>,
    pub x: Option<f64>,
    pub z: Option<f64>,
    /// Raw light phase (`GREEN`, `AMBER`, anything else means stop).
    pub light_state: Option<String>,
    pub action: Option<String>,
    /// Simulation step counter. Informational only.
    pub step: Option<i64>,
}

impl Message {
    /// A position update for `agent_id`.
    pub fn state(agent_id: impl Into<String>, x: f64, z: f64) -> Self {
        Self {
            kind: MessageKind::State,
            agent_id: Some(agent_id.into()),
            x: Some(x),
            z: Some(z),
            light_state: None,
            action: None,
            step: None,
        }
    }

    /// A traffic light phase change.
    pub fn light(light_state: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Light,
            agent_id: None,
            x: None,
            z: None,
            light_state: Some(light_state.into()),
            action: None,
            step: None,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_step(mut self, step: i64) -> Self {
        self.step = Some(step);
        self
    }

    /// True when `action` carries the reserved reset token.
    pub fn is_reset(&self) -> bool {
        self.action.as_deref() == Some(RESET_ACTION)
    }
}

/// Why a framed line could not become a `Message`.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed JSON: {0}")]
    Syntax(#[source] serde_json::Error),
    #[error("expected a JSON object, found {found}")]
    NotAnObject { found: &'static str },
    #[error("invalid field value: {0}")]
    Field(#[source] serde_json::Error),
}

/// Wire representation: every field optional, unknown fields ignored.
#[derive(Default, Serialize, Deserialize)]
#[serde(default)]
struct WireRecord {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    z: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    step: Option<i64>,
}

impl From<WireRecord> for Message {
    fn from(record: WireRecord) -> Self {
        Self {
            kind: MessageKind::from_tag(record.kind),
            agent_id: record.agent_id,
            x: record.x,
            z: record.z,
            light_state: record.state,
            action: record.action,
            step: record.step,
        }
    }
}

impl From<&Message> for WireRecord {
    fn from(msg: &Message) -> Self {
        Self {
            kind: msg.kind.tag().map(String::from),
            agent_id: msg.agent_id.clone(),
            x: msg.x,
            z: msg.z,
            state: msg.light_state.clone(),
            action: msg.action.clone(),
            step: msg.step,
        }
    }
}

/// Parse one framed line (already trimmed) into a `Message`.
pub fn parse_message(text: &str) -> Result<Message, ParseError> {
    let value: Value = serde_json::from_str(text).map_err(ParseError::Syntax)?;
    // Derived struct deserialization would also accept a JSON array, so the
    // object check has to happen before `from_value`.
    if !value.is_object() {
        return Err(ParseError::NotAnObject {
            found: json_type_name(&value),
        });
    }
    let record: WireRecord = serde_json::from_value(value).map_err(ParseError::Field)?;
    Ok(record.into())
}

/// Serialize a `Message` as one wire line, including the trailing `\n`.
pub fn encode_line(msg: &Message) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(&WireRecord::from(msg))?;
    line.push('\n');
    Ok(line)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
