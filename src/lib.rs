//! # Rover Link Library
//!
//! Telemetry link for a differential-drive rover.
//!
//! This library recovers length-delimited frames from the rover's raw byte
//! stream, decodes them into typed telemetry packets, accumulates the
//! samples in a queryable multi-channel time-series store, and derives the
//! rover's 2D trajectory by dead reckoning over wheel-encoder and heading
//! channels.

pub mod config;
pub mod error;
pub mod link;
pub mod odometry;
pub mod protocol;
pub mod record;
pub mod session;
pub mod store;
