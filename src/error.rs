//! # Error Types
//!
//! Custom error types for Rover Link using `thiserror`.

use thiserror::Error;

/// Main error type for Rover Link
#[derive(Debug, Error)]
pub enum RoverLinkError {
    /// Stream framing errors (malformed length field, oversized frame)
    #[error("framing error: {0}")]
    Framing(String),

    /// Packet decoding errors (bad opcode, missing terminator, truncated frame)
    #[error("packet decode error: {0}")]
    Decode(String),

    /// Packet encoding errors (unrepresentable packet contents)
    #[error("packet encode error: {0}")]
    Encode(String),

    /// Channel already declared in the current session (by index or name)
    #[error("duplicate channel: {0}")]
    DuplicateChannel(String),

    /// Reference to a channel that was never declared
    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Rover Link
pub type Result<T> = std::result::Result<T, RoverLinkError>;
