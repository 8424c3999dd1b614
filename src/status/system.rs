//! # System Probes
//!
//! CPU temperature, memory use, load and uptime from procfs/sysfs.

use std::fs;
use std::path::PathBuf;

use crate::error::{DashboardError, Result};

/// Snapshot of host health
#[derive(Debug, Clone, PartialEq)]
pub struct SystemStatus {
    /// Formatted like `48.3'C`, or `N/A`
    pub cpu_temp: String,
    pub memory_percent: Option<f64>,
    pub load_average: Option<f64>,
    pub uptime_secs: Option<u64>,
}

impl SystemStatus {
    /// `HH:MM:SS`, hours keep counting past 24
    pub fn uptime_text(&self) -> String {
        match self.uptime_secs {
            Some(secs) => format_uptime(secs),
            None => "--:--:--".to_string(),
        }
    }
}

/// Reads host health files
#[derive(Debug, Clone)]
pub struct SystemProbe {
    thermal_path: PathBuf,
    proc_root: PathBuf,
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new("/sys/class/thermal/thermal_zone0/temp", "/proc")
    }
}

impl SystemProbe {
    /// Probe with explicit locations (tests point these at fixtures)
    pub fn new(thermal_path: impl Into<PathBuf>, proc_root: impl Into<PathBuf>) -> Self {
        Self {
            thermal_path: thermal_path.into(),
            proc_root: proc_root.into(),
        }
    }

    /// Collect everything, missing values degrade individually
    pub fn query(&self) -> SystemStatus {
        SystemStatus {
            cpu_temp: self
                .cpu_temp()
                .map(|c| format!("{:.1}'C", c))
                .unwrap_or_else(|_| "N/A".to_string()),
            memory_percent: self.read_proc("meminfo").and_then(|s| parse_meminfo(&s)).ok(),
            load_average: self.read_proc("loadavg").and_then(|s| parse_loadavg(&s)).ok(),
            uptime_secs: self.read_proc("uptime").and_then(|s| parse_uptime(&s)).ok(),
        }
    }

    /// CPU temperature in degrees Celsius
    pub fn cpu_temp(&self) -> Result<f64> {
        let raw = fs::read_to_string(&self.thermal_path)?;
        let millidegrees: f64 = raw
            .trim()
            .parse()
            .map_err(|e| DashboardError::Probe(format!("thermal zone: {}", e)))?;
        Ok(millidegrees / 1000.0)
    }

    fn read_proc(&self, name: &str) -> Result<String> {
        Ok(fs::read_to_string(self.proc_root.join(name))?)
    }
}

/// Used memory in percent from `/proc/meminfo`
fn parse_meminfo(contents: &str) -> Result<f64> {
    let field = |name: &str| -> Option<f64> {
        contents
            .lines()
            .find(|line| line.starts_with(name))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|value| value.parse().ok())
    };

    match (field("MemTotal:"), field("MemAvailable:")) {
        (Some(total), Some(available)) if total > 0.0 => Ok((total - available) / total * 100.0),
        _ => Err(DashboardError::Probe("meminfo lacks MemTotal/MemAvailable".to_string())),
    }
}

/// One-minute load average from `/proc/loadavg`
fn parse_loadavg(contents: &str) -> Result<f64> {
    contents
        .split_whitespace()
        .next()
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| DashboardError::Probe("unreadable loadavg".to_string()))
}

/// Whole seconds since boot from `/proc/uptime`
fn parse_uptime(contents: &str) -> Result<u64> {
    contents
        .split_whitespace()
        .next()
        .and_then(|v| v.parse::<f64>().ok())
        .map(|secs| secs as u64)
        .ok_or_else(|| DashboardError::Probe("unreadable uptime".to_string()))
}

fn format_uptime(secs: u64) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
