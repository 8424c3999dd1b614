//! # APRS Dashboard Library
//!
//! Field telemetry dashboard for a portable APRS station.
//!
//! Two background listeners keep the live state current: one decodes AX.25
//! frames from a KISS TCP server, the other drains gpsd fix and sky reports.
//! A slower render loop reads that state together with battery, host and NTP
//! status and draws a multi-page view.

pub mod cache;
pub mod config;
pub mod display;
pub mod error;
pub mod gps;
pub mod handle;
pub mod kiss;
pub mod status;

pub use cache::LiveState;
pub use error::{DashboardError, Result};
