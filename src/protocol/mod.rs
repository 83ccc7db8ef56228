//! # Rover Wire Protocol Module
//!
//! Implementation of the rover telemetry wire protocol.
//!
//! This module handles:
//! - Frame extraction from the raw byte stream (escape-marked, length-delimited)
//! - Packet decoding (Start / Metadata / Data / Stop, opcode space 0-127)
//! - Packet and frame encoding for tests and device simulation
//! - Protocol constants and the `Packet` / `Value` types

pub mod decoder;
pub mod encoder;
pub mod framing;
pub mod packet;

pub use framing::{Frame, FrameExtractor};
pub use packet::{Packet, Value};
