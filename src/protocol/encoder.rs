//! # Packet Encoder
//!
//! Builds wire frames for telemetry packets.
//!
//! The rover firmware is the normal producer of this format; the encoder
//! exists for the loopback tests and as a device simulator. It always emits
//! the canonical revision: multiplexed data packets and ASCII-decimal
//! framing lengths.

use super::framing::{ESCAPE_MARKER, LENGTH_TERMINATOR};
use super::packet::*;
use crate::error::{Result, RoverLinkError};

/// Maximum channel/value pairs one multiplexed data packet can carry
pub const MAX_DATA_PAIRS: usize = 128;

/// Encode a packet into its frame payload bytes
///
/// # Errors
///
/// Returns `RoverLinkError::Encode` if a data packet carries zero or more
/// than [`MAX_DATA_PAIRS`] values, or if a channel name contains a NUL byte
/// (the wire format cannot represent either).
pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>> {
    match packet {
        Packet::Start => Ok(vec![OPCODE_START]),
        Packet::Stop => Ok(vec![OPCODE_STOP]),
        Packet::Metadata {
            channel_index,
            channel_name,
        } => encode_metadata(*channel_index, channel_name),
        Packet::Data { timestamp, values } => encode_data(*timestamp, values),
    }
}

/// Wrap a payload in the stream framing: escape marker, ASCII-decimal
/// length, null terminator, payload
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let length = payload.len().to_string();
    let mut frame = Vec::with_capacity(1 + length.len() + 1 + payload.len());
    frame.push(ESCAPE_MARKER);
    frame.extend_from_slice(length.as_bytes());
    frame.push(LENGTH_TERMINATOR);
    frame.extend_from_slice(payload);
    frame
}

/// Encode a packet and wrap it in a frame in one step
pub fn encode_packet_frame(packet: &Packet) -> Result<Vec<u8>> {
    Ok(encode_frame(&encode_packet(packet)?))
}

fn encode_metadata(channel_index: u8, channel_name: &str) -> Result<Vec<u8>> {
    push_cstring_check(channel_name, "channel name")?;

    let mut payload = Vec::with_capacity(2 + channel_name.len() + 1);
    payload.push(OPCODE_METADATA);
    payload.push(channel_index);
    payload.extend_from_slice(channel_name.as_bytes());
    payload.push(0);
    Ok(payload)
}

fn encode_data(timestamp: u64, values: &[(u8, Value)]) -> Result<Vec<u8>> {
    if values.is_empty() || values.len() > MAX_DATA_PAIRS {
        return Err(RoverLinkError::Encode(format!(
            "data packet must carry 1..={} values, got {}",
            MAX_DATA_PAIRS,
            values.len()
        )));
    }

    let mut payload = vec![OPCODE_DATA, (MAX_DATA_PAIRS - values.len()) as u8];
    payload.extend_from_slice(timestamp.to_string().as_bytes());
    payload.push(0);

    for (channel_index, value) in values {
        let raw = match value {
            Value::Number(number) => number.to_string(),
            Value::Text(text) => {
                push_cstring_check(text, "channel value")?;
                text.clone()
            }
        };
        payload.push(*channel_index);
        payload.extend_from_slice(raw.as_bytes());
        payload.push(0);
    }

    Ok(payload)
}

/// Null-terminated strings cannot themselves contain a NUL
fn push_cstring_check(text: &str, what: &str) -> Result<()> {
    if text.as_bytes().contains(&0) {
        return Err(RoverLinkError::Encode(format!(
            "{} contains a NUL byte",
            what
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::decoder::{decode_frame, decode_packet};
    use super::super::framing::FrameExtractor;
    use super::*;

    #[test]
    fn test_encode_start_and_stop() {
        assert_eq!(encode_packet(&Packet::Start).unwrap(), vec![OPCODE_START]);
        assert_eq!(encode_packet(&Packet::Stop).unwrap(), vec![OPCODE_STOP]);
    }

    #[test]
    fn test_encode_metadata_layout() {
        let packet = Packet::Metadata {
            channel_index: 2,
            channel_name: "battery".to_string(),
        };
        let payload = encode_packet(&packet).unwrap();

        assert_eq!(payload[0], OPCODE_METADATA);
        assert_eq!(payload[1], 2);
        assert_eq!(&payload[2..9], b"battery");
        assert_eq!(*payload.last().unwrap(), 0);
    }

    #[test]
    fn test_encode_data_count_byte() {
        let packet = Packet::Data {
            timestamp: 42,
            values: vec![(0, Value::Number(1.0)), (1, Value::Number(2.0))],
        };
        let payload = encode_packet(&packet).unwrap();

        assert_eq!(payload[0], OPCODE_DATA);
        assert_eq!(payload[1], 126); // 128 - 2 pairs
    }

    #[test]
    fn test_encode_data_rejects_empty_and_oversized() {
        let empty = Packet::Data {
            timestamp: 0,
            values: vec![],
        };
        assert!(matches!(
            encode_packet(&empty),
            Err(RoverLinkError::Encode(_))
        ));

        let oversized = Packet::Data {
            timestamp: 0,
            values: (0..=128).map(|i| (i as u8, Value::Number(0.0))).collect(),
        };
        assert!(matches!(
            encode_packet(&oversized),
            Err(RoverLinkError::Encode(_))
        ));
    }

    #[test]
    fn test_encode_rejects_embedded_nul() {
        let packet = Packet::Metadata {
            channel_index: 0,
            channel_name: "bad\0name".to_string(),
        };
        assert!(matches!(
            encode_packet(&packet),
            Err(RoverLinkError::Encode(_))
        ));
    }

    #[test]
    fn test_encode_frame_layout() {
        let frame = encode_frame(&[9, 8, 7]);
        assert_eq!(frame, vec![ESCAPE_MARKER, b'3', 0, 9, 8, 7]);
    }

    #[test]
    fn test_packet_roundtrip() {
        let packets = vec![
            Packet::Metadata {
                channel_index: 0,
                channel_name: "left_distance".to_string(),
            },
            Packet::Data {
                timestamp: 1250,
                values: vec![
                    (0, Value::Number(10.5)),
                    (1, Value::Text("climbing".to_string())),
                ],
            },
            Packet::Stop,
        ];

        for packet in &packets {
            let payload = encode_packet(packet).unwrap();
            assert_eq!(&decode_packet(&payload).unwrap(), packet);
        }
    }

    #[test]
    fn test_full_loopback_through_extractor() {
        // Encode three packets into frames, stream every byte through the
        // extractor, decode each recovered frame, and expect the originals
        let packets = vec![
            Packet::Metadata {
                channel_index: 3,
                channel_name: "imu_heading".to_string(),
            },
            Packet::Data {
                timestamp: 500,
                values: vec![(3, Value::Number(182.25))],
            },
            Packet::Stop,
        ];

        let mut stream = Vec::new();
        for packet in &packets {
            stream.extend_from_slice(&encode_packet_frame(packet).unwrap());
        }

        let mut extractor = FrameExtractor::new();
        let mut decoded = Vec::new();
        for byte in stream {
            if let Some(frame) = extractor.push_byte(byte).unwrap() {
                decoded.extend(decode_frame(&frame).unwrap());
            }
        }

        assert_eq!(decoded, packets);
    }
}
