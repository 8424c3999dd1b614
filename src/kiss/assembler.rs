//! # KISS Frame Assembler
//!
//! Splits the TCP byte stream into candidate frames on `FEND` (0xC0).
//!
//! Bytes after the last delimiter stay buffered until the next chunk, so a
//! frame cut in half by the socket decodes exactly like one delivered whole.

use bytes::{Buf, BytesMut};

use super::protocol::{CandidateFrame, KISS_FEND};
use crate::error::{DashboardError, Result};

/// Initial buffer capacity, a couple of typical APRS frames
const INITIAL_CAPACITY: usize = 512;

/// Accumulates unterminated bytes across socket reads
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: BytesMut,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Feed one chunk read from the socket
    ///
    /// # Arguments
    ///
    /// * `chunk` - Bytes returned by a single read
    ///
    /// # Returns
    ///
    /// * `Result<Vec<CandidateFrame>>` - Every segment terminated by a delimiter,
    ///   in stream order. Empty segments (back-to-back delimiters) are included;
    ///   the decoder rejects them.
    ///
    /// # Errors
    ///
    /// Returns `StreamClosed` for an empty chunk. A zero-length read means the
    /// peer closed the connection, not that a frame was malformed.
    pub fn ingest(&mut self, chunk: &[u8]) -> Result<Vec<CandidateFrame>> {
        if chunk.is_empty() {
            return Err(DashboardError::StreamClosed);
        }

        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == KISS_FEND) {
            let segment = self.buffer.split_to(pos).freeze();
            self.buffer.advance(1);
            frames.push(CandidateFrame::new(segment));
        }

        Ok(frames)
    }

    /// Bytes waiting for their closing delimiter
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }
}
