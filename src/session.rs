//! # Telemetry Session
//!
//! The single-writer path from raw bytes to store mutations.
//!
//! Each transport chunk is processed to completion, synchronously: bytes are
//! framed, frames decoded, and packets applied to the injected store in
//! arrival order. A malformed frame or packet is dropped with a warning and
//! the stream continues; one corrupt packet never ends a live session.
//!
//! Readers observe changes through a version counter published on a
//! `tokio::sync::watch` channel after each applied batch; they never mutate
//! the store.

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::protocol::decoder::decode_frame;
use crate::protocol::{FrameExtractor, Packet};
use crate::record::SessionRecorder;
use crate::store::TelemetryStore;

/// Where the session stands between `Start` and `Stop`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No `Start` packet seen yet
    NotStarted,
    /// Between `Start` and `Stop`; samples are flowing
    Sending,
    /// `Stop` seen; the store stays frozen for querying
    Stopped,
}

/// Counters for one ingested chunk
#[derive(Debug, Default, Clone, Copy)]
pub struct IngestReport {
    /// Complete frames recovered from the chunk
    pub frames: usize,
    /// Packets applied to the store
    pub applied: usize,
    /// Packets or frames dropped as malformed or invariant-violating
    pub dropped: usize,
}

impl IngestReport {
    /// Fold another chunk's counters into this one
    pub fn merge(&mut self, other: IngestReport) {
        self.frames += other.frames;
        self.applied += other.applied;
        self.dropped += other.dropped;
    }
}

/// One telemetry session: extractor state, store, and change notification
///
/// The session owns the store and is its only writer. Readers borrow the
/// store between `ingest` calls or watch the version counter for changes.
#[derive(Debug)]
pub struct TelemetrySession {
    extractor: FrameExtractor,
    store: TelemetryStore,
    state: SessionState,
    version: u64,
    version_tx: watch::Sender<u64>,
    recorder: Option<SessionRecorder>,
}

impl Default for TelemetrySession {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySession {
    /// Create a session with an empty store
    pub fn new() -> Self {
        let (version_tx, _) = watch::channel(0);
        Self {
            extractor: FrameExtractor::new(),
            store: TelemetryStore::new(),
            state: SessionState::NotStarted,
            version: 0,
            version_tx,
            recorder: None,
        }
    }

    /// Create a session that also writes applied samples to a recorder
    pub fn with_recorder(recorder: SessionRecorder) -> Self {
        let mut session = Self::new();
        session.recorder = Some(recorder);
        session
    }

    /// Ingest one transport chunk
    ///
    /// Drives the frame extractor byte by byte, decodes every completed
    /// frame, applies the packets, and finally publishes a new version if
    /// anything was applied. Framing and decoding failures are logged and
    /// dropped, never propagated.
    pub fn ingest_bytes(&mut self, bytes: &[u8]) -> IngestReport {
        let mut report = IngestReport::default();

        for &byte in bytes {
            let frame = match self.extractor.push_byte(byte) {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(err) => {
                    warn!("Dropping malformed frame: {}", err);
                    report.dropped += 1;
                    continue;
                }
            };

            report.frames += 1;
            match decode_frame(&frame) {
                Ok(packets) => {
                    for packet in packets {
                        self.apply_packet(packet, &mut report);
                    }
                }
                Err(err) => {
                    warn!("Dropping undecodable frame: {}", err);
                    report.dropped += 1;
                }
            }
        }

        if report.applied > 0 {
            self.bump_version();
            if let Some(recorder) = self.recorder.as_mut() {
                if let Err(err) = recorder.flush() {
                    warn!("Recorder flush failed: {}", err);
                }
            }
        }
        report
    }

    /// Apply one decoded packet to the store
    fn apply_packet(&mut self, packet: Packet, report: &mut IngestReport) {
        match packet {
            Packet::Start => {
                debug!("Session started; store reset");
                self.store.reset();
                self.state = SessionState::Sending;
                report.applied += 1;
            }

            Packet::Metadata {
                channel_index,
                channel_name,
            } => match self.store.declare_channel(channel_index, &channel_name) {
                Ok(()) => {
                    debug!("Declared channel {} ({})", channel_index, channel_name);
                    report.applied += 1;
                }
                Err(err) => {
                    warn!("Dropping metadata packet: {}", err);
                    report.dropped += 1;
                }
            },

            Packet::Data { timestamp, values } => {
                let mut any_recorded = false;
                for (channel_index, value) in values {
                    match self.store.record_sample(channel_index, timestamp, value) {
                        Ok(()) => {
                            any_recorded = true;
                            self.record_applied_sample(channel_index, timestamp);
                        }
                        Err(err) => warn!("Dropping sample: {}", err),
                    }
                }
                if any_recorded {
                    report.applied += 1;
                } else {
                    report.dropped += 1;
                }
            }

            Packet::Stop => {
                debug!("Session stopped at t={}", self.store.latest_timestamp());
                self.state = SessionState::Stopped;
                report.applied += 1;
            }
        }
    }

    /// Forced reset on transport disconnect/reconnect
    ///
    /// Drops any partial frame and clears the store so two sessions' bytes
    /// are never mixed. Publishes a version change so readers drop stale
    /// views.
    pub fn reset_link(&mut self) {
        self.extractor.reset();
        self.store.reset();
        self.state = SessionState::NotStarted;
        self.bump_version();
    }

    /// The session's store, for readers
    pub fn store(&self) -> &TelemetryStore {
        &self.store
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Monotonically increasing change counter
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Subscribe to version changes (one notification per applied batch)
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version_tx.subscribe()
    }

    /// Mirror a just-applied sample to the recorder, if one is attached
    fn record_applied_sample(&mut self, channel_index: u8, timestamp: u64) {
        let Some(recorder) = self.recorder.as_mut() else {
            return;
        };
        let Some(channel) = self
            .store
            .channels()
            .iter()
            .find(|c| c.index() == channel_index)
        else {
            return;
        };
        let Some(point) = channel.points().last() else {
            return;
        };
        if let Err(err) = recorder.record(channel.name(), timestamp, &point.value) {
            warn!("Recorder write failed: {}", err);
        }
    }

    fn bump_version(&mut self) {
        self.version += 1;
        self.version_tx.send_replace(self.version);
    }
}
