//! # Status Module
//!
//! Synchronous status queries made by the render loop once per cycle.
//!
//! This module handles:
//! - Battery voltage, current and charge estimate
//! - CPU temperature, memory use, load and uptime
//! - NTP time source
//!
//! Every query degrades to a placeholder instead of returning an error.

pub mod battery;
pub mod system;
pub mod ntp;
