//! # Positioning Reports
//!
//! Snapshot types kept in the live state cache, and classification of gpsd
//! JSON reports by their `class` member.

use serde::Deserialize;

use crate::error::{DashboardError, Result};

/// Last position fix
///
/// Replaced wholesale by every TPV report. Fields missing from the report
/// read as zero; `has_position` is true only if the report carried both
/// latitude and longitude.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FixReport {
    /// Latitude in degrees
    pub latitude: f64,

    /// Longitude in degrees
    pub longitude: f64,

    /// Altitude in meters
    pub altitude: f64,

    pub has_position: bool,
}

impl FixReport {
    pub fn with_position(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            has_position: true,
        }
    }
}

/// Last satellite view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SkyReport {
    /// Satellites used in the current solution
    pub used_satellites: u32,
}

/// A classified report from the positioning daemon
#[derive(Debug, Clone, PartialEq)]
pub enum PositionReport {
    Fix(FixReport),
    Sky(SkyReport),
    /// Any other class (VERSION, DEVICES, WATCH, ...)
    Other,
}

/// gpsd wire message, tagged by `class`
#[derive(Debug, Deserialize)]
#[serde(tag = "class")]
enum GpsdMessage {
    #[serde(rename = "TPV")]
    Tpv(TpvMessage),
    #[serde(rename = "SKY")]
    Sky(SkyMessage),
    #[serde(rename = "ERROR")]
    Error(ErrorMessage),
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct TpvMessage {
    lat: Option<f64>,
    lon: Option<f64>,
    alt: Option<f64>,
    /// gpsd 3.20 and later report MSL altitude here instead of `alt`
    #[serde(rename = "altMSL")]
    alt_msl: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SkyMessage {
    satellites: Option<Vec<SatelliteMessage>>,
    #[serde(rename = "uSat")]
    used_summary: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SatelliteMessage {
    #[serde(default)]
    used: bool,
}

/// Sent by gpsd when it rejects a request
#[derive(Debug, Deserialize)]
struct ErrorMessage {
    #[serde(default)]
    message: String,
}

impl From<TpvMessage> for FixReport {
    fn from(tpv: TpvMessage) -> Self {
        Self {
            latitude: tpv.lat.unwrap_or_default(),
            longitude: tpv.lon.unwrap_or_default(),
            altitude: tpv.alt.or(tpv.alt_msl).unwrap_or_default(),
            has_position: tpv.lat.is_some() && tpv.lon.is_some(),
        }
    }
}

impl From<SkyMessage> for SkyReport {
    fn from(sky: SkyMessage) -> Self {
        let used_satellites = match sky.satellites {
            Some(sats) => sats.iter().filter(|s| s.used).count() as u32,
            None => sky.used_summary.unwrap_or(0),
        };
        Self { used_satellites }
    }
}

/// Classify one line of gpsd JSON output
///
/// # Arguments
///
/// * `line` - One JSON object as sent by gpsd in watch mode
///
/// # Returns
///
/// * `Result<PositionReport>` - Fix, sky or other report
///
/// # Errors
///
/// - `Json` if the line is not a JSON object with a `class` member
/// - `Session` if gpsd answered with an `ERROR` report
pub fn parse_report(line: &str) -> Result<PositionReport> {
    let report = match serde_json::from_str::<GpsdMessage>(line.trim())? {
        GpsdMessage::Tpv(tpv) => PositionReport::Fix(tpv.into()),
        GpsdMessage::Sky(sky) => PositionReport::Sky(sky.into()),
        GpsdMessage::Error(error) => return Err(DashboardError::Session(error.message)),
        GpsdMessage::Other => PositionReport::Other,
    };
    Ok(report)
}
