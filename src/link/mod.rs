//! # Link Module
//!
//! Host-side transport: connects to the rover bridge over TCP and drains
//! its byte stream into a telemetry session.
//!
//! The core stays transport-agnostic; this module owns the socket, and the
//! binary owns reconnect policy and the forced session reset between
//! connections.

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::error::Result;
use crate::session::{IngestReport, TelemetrySession};
use crate::store::format_timestamp;

pub mod source;

pub use source::ByteSource;

/// Number of applied packets between status log messages
const LOG_INTERVAL_PACKETS: usize = 1000;

/// TCP connection to the rover bridge
pub struct RoverSocket {
    stream: TcpStream,
    address: String,
}

impl std::fmt::Debug for RoverSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoverSocket")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl RoverSocket {
    /// Connect to the rover bridge
    ///
    /// # Errors
    ///
    /// Returns error if the TCP connection cannot be established.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rover_link::link::RoverSocket;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let socket = RoverSocket::connect("127.0.0.1", 6789).await?;
    ///     println!("Connected to: {}", socket.address());
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let address = format!("{}:{}", host, port);
        debug!("Connecting to rover bridge at {}", address);

        let stream = TcpStream::connect(&address).await?;
        info!("Connected to rover bridge at {}", address);

        Ok(Self { stream, address })
    }

    /// The address this socket is connected to
    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl ByteSource for RoverSocket {
    async fn read_chunk(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.stream.read(buf).await
    }
}

/// Drain a byte source into a session until the stream ends
///
/// Reads chunks of up to `read_buffer_bytes` and feeds them to the session,
/// logging a status line every [`LOG_INTERVAL_PACKETS`] applied packets.
/// Returns the accumulated counters once the source reports end of stream.
///
/// # Errors
///
/// Returns error if a read fails; the session keeps whatever it applied and
/// the caller decides whether to reconnect.
pub async fn stream_into<S: ByteSource + ?Sized>(
    source: &mut S,
    session: &mut TelemetrySession,
    read_buffer_bytes: usize,
) -> Result<IngestReport> {
    let mut buf = vec![0u8; read_buffer_bytes.max(1)];
    let mut totals = IngestReport::default();
    let mut last_logged = 0;

    loop {
        let read = source.read_chunk(&mut buf).await?;
        if read == 0 {
            info!(
                "Stream ended: {} frames, {} packets applied, {} dropped",
                totals.frames, totals.applied, totals.dropped
            );
            return Ok(totals);
        }

        totals.merge(session.ingest_bytes(&buf[..read]));

        if totals.applied - last_logged >= LOG_INTERVAL_PACKETS {
            info!(
                "Applied {} packets across {} channels (t={})",
                totals.applied,
                session.store().channel_names().len(),
                format_timestamp(session.store().latest_timestamp())
            );
            last_logged = totals.applied;
        }
    }
}
