//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every field has a default, so a missing file section (or a missing file,
//! see [`Config::load_or_default`]) yields a working station setup that talks
//! to Direwolf's KISS port and a local gpsd.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{DashboardError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub station: StationConfig,
    #[serde(default)]
    pub kiss: KissConfig,
    #[serde(default)]
    pub gpsd: GpsdConfig,
    #[serde(default)]
    pub battery: BatteryConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Station identity
#[derive(Debug, Deserialize, Clone)]
pub struct StationConfig {
    #[serde(default = "default_callsign")]
    pub callsign: String,
}

/// KISS TCP source configuration
#[derive(Debug, Deserialize, Clone)]
pub struct KissConfig {
    #[serde(default = "default_kiss_host")]
    pub host: String,

    #[serde(default = "default_kiss_port")]
    pub port: u16,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    /// 0 disables the keep-alive frame
    #[serde(default)]
    pub keepalive_interval_ms: u64,
}

/// Positioning daemon configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GpsdConfig {
    #[serde(default = "default_gpsd_host")]
    pub host: String,

    #[serde(default = "default_gpsd_port")]
    pub port: u16,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

/// Where the battery gauge is read from
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BatterySource {
    /// INA219 registers read directly over I2C
    Ina219,
    /// INA219 bound to the kernel `ina2xx` hwmon driver
    Hwmon,
}

/// Battery fuel gauge configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BatteryConfig {
    #[serde(default = "default_battery_source")]
    pub source: BatterySource,

    /// I2C character device, used by `ina219`
    #[serde(default = "default_i2c_bus")]
    pub i2c_bus: PathBuf,

    /// 7-bit INA219 address, used by `ina219`
    #[serde(default = "default_i2c_address")]
    pub i2c_address: u8,

    /// hwmon device directory, used by `hwmon`
    #[serde(default = "default_hwmon_path")]
    pub hwmon_path: PathBuf,

    #[serde(default = "default_empty_voltage")]
    pub empty_voltage: f64,

    #[serde(default = "default_full_voltage")]
    pub full_voltage: f64,
}

/// Output surface
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// Clear the terminal and print every page each cycle
    Console,
    /// One page per cycle, lines cut to the small-display width
    Compact,
}

/// Render loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    #[serde(default = "default_display_mode")]
    pub mode: DisplayMode,

    #[serde(default = "default_refresh_interval_s")]
    pub refresh_interval_s: u64,

    #[serde(default = "default_line_width")]
    pub line_width: usize,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Daily rolling log files go here when set
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

// Default value functions
fn default_callsign() -> String { "N0CALL".to_string() }

fn default_kiss_host() -> String { "127.0.0.1".to_string() }
fn default_kiss_port() -> u16 { 8001 }
fn default_connect_timeout_ms() -> u64 { 10_000 }
fn default_read_timeout_ms() -> u64 { 2_000 }
fn default_reconnect_interval_ms() -> u64 { 5_000 }

fn default_gpsd_host() -> String { "127.0.0.1".to_string() }
fn default_gpsd_port() -> u16 { 2947 }

fn default_battery_source() -> BatterySource { BatterySource::Ina219 }
fn default_i2c_bus() -> PathBuf { PathBuf::from("/dev/i2c-1") }
fn default_i2c_address() -> u8 { 0x43 }
fn default_hwmon_path() -> PathBuf { PathBuf::from("/sys/class/hwmon/hwmon0") }
fn default_empty_voltage() -> f64 { 3.0 }
fn default_full_voltage() -> f64 { 4.2 }

fn default_display_mode() -> DisplayMode { DisplayMode::Console }
fn default_refresh_interval_s() -> u64 { 10 }
fn default_line_width() -> usize { 24 }

fn default_log_level() -> String { "info".to_string() }

impl Default for StationConfig {
    fn default() -> Self {
        Self { callsign: default_callsign() }
    }
}

impl Default for KissConfig {
    fn default() -> Self {
        Self {
            host: default_kiss_host(),
            port: default_kiss_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            keepalive_interval_ms: 0,
        }
    }
}

impl Default for GpsdConfig {
    fn default() -> Self {
        Self {
            host: default_gpsd_host(),
            port: default_gpsd_port(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
        }
    }
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            source: default_battery_source(),
            i2c_bus: default_i2c_bus(),
            i2c_address: default_i2c_address(),
            hwmon_path: default_hwmon_path(),
            empty_voltage: default_empty_voltage(),
            full_voltage: default_full_voltage(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            mode: default_display_mode(),
            refresh_interval_s: default_refresh_interval_s(),
            line_width: default_line_width(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
        }
    }
}

impl KissConfig {
    /// `host:port` of the KISS TCP server
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    /// `None` when keep-alive frames are disabled
    pub fn keepalive_interval(&self) -> Option<Duration> {
        (self.keepalive_interval_ms > 0).then(|| Duration::from_millis(self.keepalive_interval_ms))
    }
}

impl GpsdConfig {
    /// `host:port` of the gpsd JSON socket
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}

impl DisplayConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_s)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use aprs_dashboard::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load `path` if it exists, otherwise fall back to built-in defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(contents)?;
        config.station.callsign = config.station.callsign.trim().to_ascii_uppercase();
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        let callsign = &self.station.callsign;
        if callsign.is_empty() {
            return Err(invalid("station callsign cannot be empty"));
        }
        if !callsign.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(invalid(format!(
                "station callsign '{}' may only contain letters, digits and '-'",
                callsign
            )));
        }

        if self.kiss.host.is_empty() {
            return Err(invalid("kiss host cannot be empty"));
        }
        if self.gpsd.host.is_empty() {
            return Err(invalid("gpsd host cannot be empty"));
        }
        if self.kiss.port == 0 || self.gpsd.port == 0 {
            return Err(invalid("ports must be greater than 0"));
        }

        for (name, value) in [
            ("kiss.connect_timeout_ms", self.kiss.connect_timeout_ms),
            ("kiss.read_timeout_ms", self.kiss.read_timeout_ms),
            ("kiss.reconnect_interval_ms", self.kiss.reconnect_interval_ms),
            ("gpsd.reconnect_interval_ms", self.gpsd.reconnect_interval_ms),
        ] {
            if value == 0 || value > 60_000 {
                return Err(invalid(format!("{} must be between 1 and 60000", name)));
            }
        }

        if self.kiss.keepalive_interval_ms > 600_000 {
            return Err(invalid("kiss.keepalive_interval_ms must be at most 600000"));
        }

        if self.battery.empty_voltage < 0.0 || self.battery.full_voltage <= self.battery.empty_voltage {
            return Err(invalid("battery full_voltage must be greater than empty_voltage (both >= 0)"));
        }

        if !(0x03..=0x77).contains(&self.battery.i2c_address) {
            return Err(invalid("battery i2c_address must be a 7-bit address between 0x03 and 0x77"));
        }

        if self.display.refresh_interval_s == 0 {
            return Err(invalid("display refresh_interval_s must be greater than 0"));
        }
        if self.display.line_width < 10 {
            return Err(invalid("display line_width must be at least 10"));
        }

        if self.logging.level.trim().is_empty() {
            return Err(invalid("logging level cannot be empty"));
        }

        Ok(())
    }
}

fn invalid(msg: impl std::fmt::Display) -> DashboardError {
    DashboardError::Config(toml::de::Error::custom(msg))
}
