//! # KISS / AX.25 Protocol Constants and Types
//!
//! Core definitions shared by the frame assembler, the decoder and the
//! listener.
//!
//! ## Frame layout (as received from the KISS TCP port)
//!
//! ```text
//! C0 | 00 | dest(6) ssid(1) | src(6) ssid(1) | ctl(1) pid(1) | info(N) | trailer(2) | C0
//!      ^type byte  '----------- 16-byte AX.25 header -------------'
//! ```
//!
//! Only the fixed header without digipeater path is understood. Escaped
//! `FESC` sequences are not undone, a literal 0xC0 inside the info field ends
//! the frame early.

use bytes::Bytes;
use std::fmt;

/// KISS frame delimiter
pub const KISS_FEND: u8 = 0xC0;

/// KISS type byte of a data frame on port 0
pub const KISS_DATA_FRAME: u8 = 0x00;

/// AX.25 header size without digipeater path: two 7-byte addresses + control + PID
pub const AX25_HEADER_LEN: usize = 16;

/// Trailing bytes stripped from every frame, never verified
pub const AX25_TRAILER_LEN: usize = 2;

/// Type byte + header + trailer; a data frame must be longer than this
pub const KISS_FRAME_OVERHEAD: usize = 1 + AX25_HEADER_LEN + AX25_TRAILER_LEN;

/// Byte range of the destination callsign inside the AX.25 header
pub const AX25_DEST_RANGE: std::ops::Range<usize> = 0..6;

/// Byte range of the source callsign inside the AX.25 header
pub const AX25_SRC_RANGE: std::ops::Range<usize> = 7..13;

/// Empty data frame used as keep-alive
pub const KISS_KEEPALIVE_FRAME: [u8; 3] = [KISS_FEND, KISS_DATA_FRAME, KISS_FEND];

/// Status text shown before any frame has been decoded
pub const STATUS_NO_FRAME: &str = "APRS: No Frame";

/// Status text shown after a failed connection attempt
pub const STATUS_CONNECTION_FAILED: &str = "APRS: Connection failed";

/// Bytes found between two KISS delimiters
///
/// Not yet validated. Wraps a frozen [`Bytes`], so it cannot change after the
/// assembler hands it out.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateFrame(Bytes);

impl CandidateFrame {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A decoded AX.25 UI frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub source: String,
    pub destination: String,
    pub payload: String,
    /// Station callsign appears somewhere in `source`
    pub is_own_transmission: bool,
}

impl DecodedFrame {
    /// Build a frame and classify it against the station callsign
    ///
    /// The match is a substring test, so `OE5ITH` also claims `OE5ITH-9`
    /// (and, less usefully, `XOE5ITH`).
    pub fn new(
        source: impl Into<String>,
        destination: impl Into<String>,
        payload: impl Into<String>,
        station_callsign: &str,
    ) -> Self {
        let source = source.into();
        let is_own_transmission = !station_callsign.is_empty() && source.contains(station_callsign);
        Self {
            source,
            destination: destination.into(),
            payload: payload.into(),
            is_own_transmission,
        }
    }
}

impl fmt::Display for DecodedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_own_transmission {
            write!(f, "{} > {} | {}", self.source, self.destination, self.payload)
        } else {
            write!(f, "{} RX", self.source)
        }
    }
}

/// Most recent observable result of the KISS listener
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LatestFrameStatus {
    /// Nothing decoded yet
    #[default]
    NoFrame,
    /// Last successfully decoded frame
    Frame(DecodedFrame),
    /// Last connection attempt failed
    ConnectionFailed { reason: String },
}

impl fmt::Display for LatestFrameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LatestFrameStatus::NoFrame => f.write_str(STATUS_NO_FRAME),
            LatestFrameStatus::Frame(frame) => write!(f, "{}", frame),
            LatestFrameStatus::ConnectionFailed { .. } => f.write_str(STATUS_CONNECTION_FAILED),
        }
    }
}

/// KISS listener connection state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed(String),
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Connected => f.write_str("connected"),
            ConnectionState::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}
