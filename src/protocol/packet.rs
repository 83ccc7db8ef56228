//! # Protocol Constants and Types
//!
//! Core definitions for the rover telemetry wire protocol.

use serde::Serialize;

/// Opcode for a Start packet (new telemetry session)
pub const OPCODE_START: u8 = 127;

/// Opcode for a Metadata packet (channel declaration)
pub const OPCODE_METADATA: u8 = 126;

/// Opcode for a Stop packet (end of session)
pub const OPCODE_STOP: u8 = 125;

/// Opcode for a multiplexed Data packet (several channels, one timestamp)
pub const OPCODE_DATA: u8 = 124;

/// Highest valid opcode; anything above is a protocol error
pub const OPCODE_MAX: u8 = 127;

/// Opcodes 0..=123 are the legacy single-channel Data form, where the
/// opcode itself is the channel index
pub const LEGACY_CHANNEL_MAX: u8 = 123;

/// A telemetry value as carried on the wire
///
/// The device sends every value as a null-terminated string. A string that
/// parses as a complete floating-point literal becomes `Number`; anything
/// else is kept as `Text`. Text values are retained for lookup but excluded
/// from numeric aggregates and from odometry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Numeric sample
    Number(f64),
    /// Non-numeric sample (status strings, labels, etc.)
    Text(String),
}

impl Value {
    /// Coerce a raw wire string into a value
    ///
    /// The whole string must parse as an `f64` to become `Number`;
    /// a numeric prefix ("3.5abc") is not enough.
    pub fn from_raw(raw: &str) -> Self {
        match raw.parse::<f64>() {
            Ok(number) => Value::Number(number),
            Err(_) => Value::Text(raw.to_string()),
        }
    }

    /// The numeric content, if any
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(number) => Some(*number),
            Value::Text(_) => None,
        }
    }

    /// Whether this value participates in numeric aggregates
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Number(_))
    }
}

/// A decoded telemetry packet
///
/// Closed set of protocol packet kinds; the decoder matches exhaustively on
/// the opcode and new kinds are added by extending this enum.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Signals a new telemetry session; resets the store
    Start,
    /// Declares a channel before any data references it
    Metadata {
        /// Stable channel key used by Data packets
        channel_index: u8,
        /// Display name, unique per session
        channel_name: String,
    },
    /// One or more channel samples sharing a timestamp
    Data {
        /// Milliseconds since session start
        timestamp: u64,
        /// Channel/value pairs in arrival order; duplicate indices within
        /// one packet have already been collapsed (last write wins)
        values: Vec<(u8, Value)>,
    },
    /// Signals end of session; the store stays queryable
    Stop,
}
