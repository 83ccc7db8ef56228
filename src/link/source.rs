//! Trait abstraction for byte-stream sources to enable testing

use async_trait::async_trait;
use std::io;

/// Trait for raw telemetry byte sources
///
/// The core never assumes chunk sizes; whatever a read returns is fed to
/// the frame extractor byte by byte.
#[async_trait]
pub trait ByteSource: Send {
    /// Read the next chunk into `buf`; `Ok(0)` means the stream ended
    async fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}
