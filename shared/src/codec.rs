//! Text wire format: position reports, world snapshots and inbound dispatch
//!
//! The wire carries no type byte, so every inbound message is classified once
//! by [`decode_incoming`] and everything downstream works on [`Incoming`].

use crate::fragment;
use crate::{
    Color, Position, UserId, CLIENT_ID_ELEMENT, DEFAULT_COLOR, POSITION_PREFIX, SNAPSHOT_ELEMENT,
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("message does not start with POS:")]
    NotAPositionMessage,
    #[error("malformed position message `{0}`")]
    MalformedPosition(String),
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),
    #[error("invalid color value `{0}`")]
    InvalidColor(String),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Formats a position as `POS:x,y,z` with two fractional digits per axis
pub fn encode_position(position: &Position) -> String {
    format!(
        "{}{},{},{}",
        POSITION_PREFIX,
        format_coordinate(position.x),
        format_coordinate(position.y),
        format_coordinate(position.z)
    )
}

/// Two fractional digits with ties rounded away from zero (`0.125` gives
/// `0.13`). An `f32` scaled by 100 is exact in `f64`, so ties are exact too.
/// Anything that rounds to zero prints unsigned.
fn format_coordinate(value: f32) -> String {
    let hundredths = (f64::from(value) * 100.0).round();
    if !hundredths.is_finite() {
        return format!("{:.2}", value);
    }
    if hundredths == 0.0 {
        return "0.00".to_string();
    }

    let sign = if hundredths < 0.0 { "-" } else { "" };
    let magnitude = hundredths.abs();
    format!(
        "{}{}.{:02}",
        sign,
        (magnitude / 100.0).trunc(),
        magnitude % 100.0
    )
}

pub fn decode_position(message: &str) -> Result<Position, CodecError> {
    let body = message
        .trim()
        .strip_prefix(POSITION_PREFIX)
        .ok_or(CodecError::NotAPositionMessage)?;
    let malformed = || CodecError::MalformedPosition(message.to_string());

    let mut parts = body.split(',');
    let mut coordinates = [0.0f32; 3];
    for slot in coordinates.iter_mut() {
        let part = parts.next().ok_or_else(malformed)?;
        *slot = part
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(malformed)?;
    }

    if parts.next().is_some() {
        return Err(malformed());
    }

    Ok(Position::new(coordinates[0], coordinates[1], coordinates[2]))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotEntry {
    pub position: Position,
    pub color: Color,
}

/// Complete server view of every connected user at one instant
///
/// Ids whose entry could not be decoded are still remembered as present, so a
/// single bad entry never evicts a user that is known to be connected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    entries: BTreeMap<UserId, SnapshotEntry>,
    malformed: BTreeSet<UserId>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: UserId, entry: SnapshotEntry) {
        self.malformed.remove(&id);
        self.entries.insert(id, entry);
    }

    pub fn mark_malformed(&mut self, id: UserId) {
        if !self.entries.contains_key(&id) {
            self.malformed.insert(id);
        }
    }

    pub fn get(&self, id: &str) -> Option<&SnapshotEntry> {
        self.entries.get(id)
    }

    /// Whether the server listed `id` at all, well-formed or not
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id) || self.malformed.contains(id)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&UserId, &SnapshotEntry)> {
        self.entries.iter()
    }

    pub fn malformed(&self) -> impl Iterator<Item = &UserId> {
        self.malformed.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Deserialize)]
struct WireEntry {
    position: String,
    #[serde(default)]
    color: Option<Value>,
}

#[derive(Serialize)]
struct WireEntryOut {
    position: String,
    color: Color,
}

pub fn decode_snapshot(json: &str) -> Result<Snapshot, CodecError> {
    let value: Value = serde_json::from_str(json.trim())?;
    let Value::Object(users) = value else {
        return Err(CodecError::MalformedSnapshot(
            "expected an object keyed by user id".to_string(),
        ));
    };

    let mut snapshot = Snapshot::new();
    for (id, raw) in users {
        let id = UserId::from(id);
        match decode_entry(raw) {
            Ok(entry) => snapshot.insert(id, entry),
            Err(e) => {
                debug!("Dropping snapshot entry for {}: {}", id, e);
                snapshot.mark_malformed(id);
            }
        }
    }

    Ok(snapshot)
}

fn decode_entry(raw: Value) -> Result<SnapshotEntry, CodecError> {
    let wire: WireEntry = serde_json::from_value(raw)?;
    let position = decode_position(&wire.position)?;
    let color = match wire.color {
        None | Some(Value::Null) => DEFAULT_COLOR,
        Some(value) => Color::from_wire(&value).unwrap_or_else(|e| {
            warn!("{}, using default color", e);
            DEFAULT_COLOR
        }),
    };

    Ok(SnapshotEntry { position, color })
}

pub fn encode_snapshot(snapshot: &Snapshot) -> Result<String, CodecError> {
    let wire: BTreeMap<&UserId, WireEntryOut> = snapshot
        .entries()
        .map(|(id, entry)| {
            (
                id,
                WireEntryOut {
                    position: encode_position(&entry.position),
                    color: entry.color,
                },
            )
        })
        .collect();

    Ok(serde_json::to_string(&wire)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    /// `client-id` element embedded in a regular message
    InlineMessage,
    /// `client-id` element delivered as an out-of-band swap
    ElementSwap,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Position(Position),
    Snapshot(Snapshot),
    Identity { id: UserId, source: IdentitySource },
    Unrecognized,
}

/// Classifies one inbound message; identity always precedes a snapshot
/// carried by the same message.
pub fn decode_incoming(raw: &str) -> Vec<Incoming> {
    let mut decoded = Vec::new();

    if let Some(element) = fragment::find_element(raw, CLIENT_ID_ELEMENT) {
        if let Some(id) = element.identity_value() {
            let source = if element.is_out_of_band() {
                IdentitySource::ElementSwap
            } else {
                IdentitySource::InlineMessage
            };
            decoded.push(Incoming::Identity {
                id: UserId::new(id),
                source,
            });
        }
    }

    let snapshot_text = match fragment::find_element(raw, SNAPSHOT_ELEMENT) {
        Some(element) => element.text().map(fragment::unescape),
        None if raw.trim_start().starts_with('{') => Some(raw.to_string()),
        None => None,
    };

    if let Some(text) = snapshot_text.filter(|text| text.contains('{')) {
        match decode_snapshot(&text) {
            Ok(snapshot) => decoded.push(Incoming::Snapshot(snapshot)),
            Err(e) => debug!("Ignoring unreadable snapshot: {}", e),
        }
    }

    if decoded.is_empty() {
        if let Ok(position) = decode_position(raw) {
            decoded.push(Incoming::Position(position));
        }
    }

    if decoded.is_empty() {
        decoded.push(Incoming::Unrecognized);
    }

    decoded
}

/// How outbound reports are put on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutboundFraming {
    /// The encoded text as-is
    #[default]
    Raw,
    /// `{"msg": "..."}`, the body an HTMX `ws-send` form submits
    FormEnvelope,
}

impl OutboundFraming {
    pub fn frame(self, text: String) -> String {
        match self {
            OutboundFraming::Raw => text,
            OutboundFraming::FormEnvelope => serde_json::json!({ "msg": text }).to_string(),
        }
    }
}

#[derive(Deserialize)]
struct FormEnvelope {
    msg: String,
}

/// Inverse of [`OutboundFraming::frame`]; unframed text passes through
pub fn unwrap_envelope(text: &str) -> String {
    if text.trim_start().starts_with('{') {
        if let Ok(envelope) = serde_json::from_str::<FormEnvelope>(text) {
            return envelope.msg;
        }
    }
    text.to_string()
}
