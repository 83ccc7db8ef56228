//! # Packet Decoder
//!
//! Interprets a recovered frame as one or more typed telemetry packets.
//!
//! The first byte of every packet is its opcode (0-127). Opcodes 124-127
//! are control and multiplexed-data packets; 0-123 is the legacy
//! single-channel data form where the opcode itself is the channel index.

use super::packet::*;
use crate::error::{Result, RoverLinkError};

/// Decode the first packet in a frame
///
/// Any bytes left over after the packet are ignored. Use [`decode_frame`]
/// for frames that batch several packets.
///
/// # Errors
///
/// Returns `RoverLinkError::Decode` if the frame is empty, the opcode is
/// outside 0-127, a required field is truncated, or a null terminator is
/// missing.
pub fn decode_packet(frame: &[u8]) -> Result<Packet> {
    let mut reader = Reader::new(frame);
    consume_packet(&mut reader)
}

/// Decode every packet in a frame
///
/// The rover batches packets, so one frame may carry a whole metadata block
/// or several data packets back to back. Decoding stops at the first
/// malformed packet; packets already decoded from the frame are discarded
/// with it (one corrupt frame never yields partial results).
pub fn decode_frame(frame: &[u8]) -> Result<Vec<Packet>> {
    let mut reader = Reader::new(frame);
    let mut packets = Vec::new();
    packets.push(consume_packet(&mut reader)?);
    while !reader.is_empty() {
        packets.push(consume_packet(&mut reader)?);
    }
    Ok(packets)
}

/// Decode one packet at the reader's position
fn consume_packet(reader: &mut Reader<'_>) -> Result<Packet> {
    let opcode = reader
        .next_byte()
        .ok_or_else(|| RoverLinkError::Decode("frame is empty".to_string()))?;

    if opcode > OPCODE_MAX {
        return Err(RoverLinkError::Decode(format!(
            "invalid opcode: {}",
            opcode
        )));
    }

    match opcode {
        OPCODE_START => Ok(Packet::Start),
        OPCODE_STOP => Ok(Packet::Stop),
        OPCODE_METADATA => decode_metadata(reader),
        OPCODE_DATA => decode_multiplexed_data(reader),
        channel_index => decode_legacy_data(channel_index, reader),
    }
}

/// Metadata packet: channel index byte, then a null-terminated channel name
fn decode_metadata(reader: &mut Reader<'_>) -> Result<Packet> {
    let channel_index = reader
        .next_byte()
        .ok_or_else(|| RoverLinkError::Decode("metadata packet has no channel index".to_string()))?;
    let channel_name = reader.next_string("channel name")?;

    Ok(Packet::Metadata {
        channel_index,
        channel_name,
    })
}

/// Multiplexed data packet: count byte, shared ASCII-decimal timestamp,
/// then `128 - count` channel/value pairs
fn decode_multiplexed_data(reader: &mut Reader<'_>) -> Result<Packet> {
    let count_byte = reader
        .next_byte()
        .ok_or_else(|| RoverLinkError::Decode("data packet has no count byte".to_string()))?;
    if count_byte > 127 {
        return Err(RoverLinkError::Decode(format!(
            "pair count byte out of range: {}",
            count_byte
        )));
    }
    let pairs = 128 - count_byte as usize;

    let timestamp = reader.next_timestamp()?;

    let mut values: Vec<(u8, Value)> = Vec::with_capacity(pairs);
    for _ in 0..pairs {
        let channel_index = reader
            .next_byte()
            .ok_or_else(|| RoverLinkError::Decode("data pair has no channel index".to_string()))?;
        let raw = reader.next_string("channel value")?;
        let value = Value::from_raw(&raw);

        // Last write wins on a duplicate index within one packet
        match values.iter_mut().find(|(index, _)| *index == channel_index) {
            Some(entry) => entry.1 = value,
            None => values.push((channel_index, value)),
        }
    }

    Ok(Packet::Data { timestamp, values })
}

/// Legacy single-channel data packet: the opcode is the channel index,
/// followed by an ASCII-decimal timestamp and one value
fn decode_legacy_data(channel_index: u8, reader: &mut Reader<'_>) -> Result<Packet> {
    let timestamp = reader.next_timestamp()?;
    let raw = reader.next_string("channel value")?;

    Ok(Packet::Data {
        timestamp,
        values: vec![(channel_index, Value::from_raw(&raw))],
    })
}

/// Forward-only view over a frame's bytes
struct Reader<'a> {
    frame: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(frame: &'a [u8]) -> Self {
        Self { frame, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.frame.len()
    }

    fn next_byte(&mut self) -> Option<u8> {
        let byte = self.frame.get(self.pos).copied();
        if byte.is_some() {
            self.pos += 1;
        }
        byte
    }

    /// Consume bytes up to (and including) the next null terminator
    fn next_string(&mut self, what: &str) -> Result<String> {
        let start = self.pos;
        while let Some(&byte) = self.frame.get(self.pos) {
            self.pos += 1;
            if byte == 0 {
                let bytes = self.frame[start..self.pos - 1].to_vec();
                return String::from_utf8(bytes).map_err(|_| {
                    RoverLinkError::Decode(format!("{} is not valid UTF-8", what))
                });
            }
        }
        Err(RoverLinkError::Decode(format!(
            "{} is not null-terminated",
            what
        )))
    }

    /// Consume a null-terminated ASCII-decimal timestamp
    fn next_timestamp(&mut self) -> Result<u64> {
        let text = self.next_string("timestamp")?;
        text.parse::<u64>().map_err(|_| {
            RoverLinkError::Decode(format!("timestamp is not a decimal number: {:?}", text))
        })
    }
}
