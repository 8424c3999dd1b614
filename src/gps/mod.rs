//! # Positioning Module
//!
//! Last-known-good GPS state from the positioning daemon (gpsd).
//!
//! This module handles:
//! - Classifying daemon reports into fix (TPV) and sky (SKY) reports
//! - Holding a long-lived daemon session
//! - Publishing each report wholesale into the live state cache

pub mod report;
pub mod session;
pub mod listener;
