use serde::Serialize;
use std::borrow::Borrow;
use std::fmt;
use std::ops::Add;

pub mod codec;
pub mod fragment;

pub use codec::{
    decode_incoming, decode_position, decode_snapshot, encode_position, encode_snapshot,
    unwrap_envelope, CodecError, IdentitySource, Incoming, OutboundFraming, Snapshot,
    SnapshotEntry,
};

pub const POSITION_PREFIX: &str = "POS:";
pub const CLIENT_ID_ELEMENT: &str = "client-id";
pub const SNAPSHOT_ELEMENT: &str = "position-updates";

pub const MOVE_SPEED: f32 = 0.1;
pub const REPORT_EPSILON: f32 = 1e-4;
pub const SPAWN_POSITION: Position = Position::new(0.0, 0.5, 0.0);
pub const DEFAULT_COLOR: Color = Color::new(0xFFFF00);

/// Server-assigned identifier of a connected user
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for UserId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// True when any axis moved further than `epsilon` away from `other`
    pub fn differs_from(&self, other: &Position, epsilon: f32) -> bool {
        (self.x - other.x).abs() > epsilon
            || (self.y - other.y).abs() > epsilon
            || (self.z - other.z).abs() > epsilon
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, other: Position) -> Position {
        Position::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

/// 24-bit RGB color as carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(u32);

impl Color {
    pub const fn new(rgb: u32) -> Self {
        Self(rgb & 0xFF_FFFF)
    }

    pub fn rgb(self) -> u32 {
        self.0
    }

    pub fn channels(self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }

    /// Parses `0x`/`#` prefixed hex or plain decimal text
    pub fn parse(text: &str) -> Result<Self, CodecError> {
        let text = text.trim();
        let invalid = || CodecError::InvalidColor(text.to_string());

        let rgb = if let Some(hex) = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .or_else(|| text.strip_prefix('#'))
        {
            u32::from_str_radix(hex, 16).map_err(|_| invalid())?
        } else {
            text.parse::<u32>().map_err(|_| invalid())?
        };

        Ok(Self::new(rgb))
    }

    /// Accepts the JSON shapes servers use for colors: integers, floats and strings
    pub fn from_wire(value: &serde_json::Value) -> Result<Self, CodecError> {
        match value {
            serde_json::Value::Number(number) => {
                if let Some(rgb) = number.as_u64() {
                    return Ok(Self::new(rgb as u32));
                }
                match number.as_f64() {
                    Some(rgb) if rgb.is_finite() && rgb >= 0.0 => Ok(Self::new(rgb as u32)),
                    _ => Err(CodecError::InvalidColor(number.to_string())),
                }
            }
            serde_json::Value::String(text) => Self::parse(text),
            other => Err(CodecError::InvalidColor(other.to_string())),
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        DEFAULT_COLOR
    }
}

impl Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use serde_json::json;

    #[test]
    fn test_position_differs_beyond_epsilon() {
        let a = Position::new(1.0, 0.5, 0.0);
        let b = Position::new(1.00005, 0.5, 0.0);
        let c = Position::new(1.0, 0.5, -0.1);

        assert!(!a.differs_from(&b, REPORT_EPSILON));
        assert!(a.differs_from(&c, REPORT_EPSILON));
    }

    #[test]
    fn test_position_add() {
        let sum = SPAWN_POSITION + Position::new(0.2, 0.0, -0.1);
        assert_approx_eq!(sum.x, 0.2);
        assert_approx_eq!(sum.y, 0.5);
        assert_approx_eq!(sum.z, -0.1);
    }

    #[test]
    fn test_user_id_lookup_by_str() {
        let mut ids = std::collections::HashMap::new();
        ids.insert(UserId::from("u1"), 1);
        assert_eq!(ids.get("u1"), Some(&1));
        assert_eq!(UserId::new("u1").to_string(), "u1");
    }

    #[test]
    fn test_color_masks_to_24_bits() {
        assert_eq!(Color::new(0x12FF_FF00).rgb(), 0xFF_FF00);
        assert_eq!(Color::new(0xFFFF00).channels(), (255, 255, 0));
    }

    #[test]
    fn test_color_parse_forms() {
        assert_eq!(Color::parse("0xffff00").unwrap(), Color::new(0xFFFF00));
        assert_eq!(Color::parse("#00FF00").unwrap(), Color::new(0x00FF00));
        assert_eq!(Color::parse("16776960").unwrap(), Color::new(0xFFFF00));
        assert!(Color::parse("yellow").is_err());
        assert!(Color::parse("").is_err());
    }

    #[test]
    fn test_color_from_wire() {
        assert_eq!(Color::from_wire(&json!(16776960)).unwrap().rgb(), 0xFFFF00);
        assert_eq!(Color::from_wire(&json!(255.0)).unwrap().rgb(), 0xFF);
        assert_eq!(Color::from_wire(&json!("0xff0000")).unwrap().rgb(), 0xFF0000);
        assert!(Color::from_wire(&json!(-5)).is_err());
        assert!(Color::from_wire(&json!([1, 2, 3])).is_err());
    }

    #[test]
    fn test_color_serializes_as_number() {
        let encoded = serde_json::to_string(&Color::new(0xFFFF00)).unwrap();
        assert_eq!(encoded, "16776960");
    }
}
