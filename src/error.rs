//! # Error Types
//!
//! Custom error types for the APRS dashboard using `thiserror`.
//!
//! None of these errors ever reach the render loop. Each one is routed by
//! [`DashboardError::disposition`] to a reconnect, a retry on the same stream,
//! or a placeholder value in the live state cache.

use thiserror::Error;

/// Main error type for the APRS dashboard
#[derive(Debug, Error)]
pub enum DashboardError {
    /// TCP connect to a data source failed or timed out
    #[error("Connection to {addr} failed: {reason}")]
    ConnectFailed { addr: String, reason: String },

    /// No data arrived within the read timeout
    #[error("Read timed out")]
    ReadTimeout,

    /// Peer closed the stream (zero-length read)
    #[error("Stream closed by peer")]
    StreamClosed,

    /// Candidate frame failed the shape check (type byte, length)
    #[error("Malformed frame: {0}")]
    FrameMalformed(String),

    /// Frame passed the shape check but could not be decoded
    #[error("Frame decode failed: {0}")]
    DecodeFailed(String),

    /// Positioning daemon session errors
    #[error("Positioning session error: {0}")]
    Session(String),

    /// Status probe errors (battery, sysfs, ntpq)
    #[error("Status probe error: {0}")]
    Probe(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// How a failure is absorbed by the ingestion layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The stream is gone: drop it and open a new one
    Reconnect,
    /// Same stream, try again (read again, wait for the next report)
    Retry,
    /// Drop the input and keep or publish a placeholder value
    Placeholder,
}

impl DashboardError {
    /// Route this error to a recovery action.
    ///
    /// Lost connections are reopened, stalls and daemon-side complaints are
    /// retried on the same stream, and anything that concerns a single piece
    /// of data (one frame, one report, one probe) degrades to a placeholder.
    pub fn disposition(&self) -> Disposition {
        match self {
            DashboardError::ConnectFailed { .. }
            | DashboardError::StreamClosed
            | DashboardError::Io(_) => Disposition::Reconnect,
            DashboardError::ReadTimeout | DashboardError::Session(_) => Disposition::Retry,
            DashboardError::FrameMalformed(_)
            | DashboardError::DecodeFailed(_)
            | DashboardError::Probe(_)
            | DashboardError::Json(_)
            | DashboardError::Config(_) => Disposition::Placeholder,
        }
    }
}

/// Result type alias for the APRS dashboard
pub type Result<T> = std::result::Result<T, DashboardError>;
