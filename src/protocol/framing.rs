//! # Frame Extractor
//!
//! Recovers discrete length-delimited frames from the unbounded byte stream.
//!
//! Every frame on the wire is `ESC`, an ASCII-decimal payload length, a null
//! terminator, then exactly that many payload bytes. Bytes outside a frame
//! are line noise and are discarded.

use bytes::{BufMut, BytesMut};

use crate::error::{Result, RoverLinkError};

/// Escape marker that opens every frame (ASCII ESC)
pub const ESCAPE_MARKER: u8 = 27;

/// Terminator of the ASCII-decimal length field
pub const LENGTH_TERMINATOR: u8 = 0;

/// Maximum accepted payload length
///
/// The rover never sends frames anywhere near this size; a larger declared
/// length means a corrupted length field.
pub const MAX_FRAME_LENGTH: usize = 64 * 1024;

/// Maximum digits accepted in the length field
const MAX_LENGTH_DIGITS: usize = 8;

/// One recovered frame payload, ready for the packet decoder
pub type Frame = Vec<u8>;

/// Extractor state between bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for the escape marker; all other bytes are discarded
    Idle,
    /// Accumulating ASCII-decimal length digits until the null terminator
    ReadingLength,
    /// Accumulating exactly `expected` payload bytes
    ReadingPayload,
}

/// Stateful byte-stream framer
///
/// Driven synchronously, one byte at a time; the only component that holds
/// byte-level state. Errors reset the state machine to idle and framing
/// resumes at the next escape marker, so a corrupted frame never takes down
/// the stream.
#[derive(Debug)]
pub struct FrameExtractor {
    state: State,
    buf: BytesMut,
    expected: usize,
}

impl Default for FrameExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameExtractor {
    /// Create an extractor in the idle state
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            buf: BytesMut::new(),
            expected: 0,
        }
    }

    /// Ingest one byte from the stream
    ///
    /// Returns `Ok(Some(frame))` when this byte completes a frame,
    /// `Ok(None)` otherwise.
    ///
    /// # Errors
    ///
    /// Returns `RoverLinkError::Framing` if the length field is not a
    /// parseable ASCII-decimal number, has too many digits, or declares a
    /// payload larger than [`MAX_FRAME_LENGTH`]. The extractor is back in
    /// the idle state after any error.
    pub fn push_byte(&mut self, byte: u8) -> Result<Option<Frame>> {
        match self.state {
            State::Idle => {
                if byte == ESCAPE_MARKER {
                    self.state = State::ReadingLength;
                    self.buf.clear();
                }
                // Not in a frame; anything else is discarded
                Ok(None)
            }

            State::ReadingLength => {
                if byte == LENGTH_TERMINATOR {
                    let length = self.parse_length()?;
                    self.buf.clear();
                    if length == 0 {
                        // Nothing to collect; the empty frame is complete now
                        self.state = State::Idle;
                        return Ok(Some(Frame::new()));
                    }
                    self.expected = length;
                    self.state = State::ReadingPayload;
                    Ok(None)
                } else if self.buf.len() >= MAX_LENGTH_DIGITS {
                    self.reset();
                    Err(RoverLinkError::Framing(format!(
                        "length field exceeds {} digits",
                        MAX_LENGTH_DIGITS
                    )))
                } else {
                    // An escape marker lands here too; it will surface as a
                    // malformed length once the terminator arrives
                    self.buf.put_u8(byte);
                    Ok(None)
                }
            }

            State::ReadingPayload => {
                self.buf.put_u8(byte);
                if self.buf.len() == self.expected {
                    let frame = self.buf.split().to_vec();
                    self.reset();
                    return Ok(Some(frame));
                }
                Ok(None)
            }
        }
    }

    /// Drop any partial frame and return to the idle state
    ///
    /// Called on transport reconnect so two sessions' bytes are never mixed
    /// inside one frame.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.buf.clear();
        self.expected = 0;
    }

    /// Decode the buffered length digits, resetting on failure
    fn parse_length(&mut self) -> Result<usize> {
        let digits = std::str::from_utf8(&self.buf)
            .ok()
            .and_then(|text| text.parse::<usize>().ok());

        let length = match digits {
            Some(length) => length,
            None => {
                let field = self.buf.split().to_vec();
                self.reset();
                return Err(RoverLinkError::Framing(format!(
                    "malformed length field: {:?}",
                    field
                )));
            }
        };

        if length > MAX_FRAME_LENGTH {
            self.reset();
            return Err(RoverLinkError::Framing(format!(
                "declared payload of {} bytes exceeds maximum {}",
                length, MAX_FRAME_LENGTH
            )));
        }

        Ok(length)
    }
}
