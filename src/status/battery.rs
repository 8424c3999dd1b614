//! # Battery Fuel Gauge
//!
//! Reads the INA219 power monitor on the battery rail and turns the raw
//! reading into a charge estimate.
//!
//! Two sources are supported: the INA219 registers over I2C (bus voltage
//! register 0x02, current register 0x04), or the kernel `ina2xx` hwmon driver
//! when it has claimed the chip.

use embedded_hal::i2c::{Error as _, I2c};
use linux_embedded_hal::I2cdev;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::{BatteryConfig, BatterySource};
use crate::error::{DashboardError, Result};

/// Current above which the pack counts as charging (mA)
const CHARGE_THRESHOLD_MA: f64 = 10.0;

/// INA219 bus voltage register
pub const INA219_REG_BUS_VOLTAGE: u8 = 0x02;

/// INA219 current register
pub const INA219_REG_CURRENT: u8 = 0x04;

/// Volts per bit of the byte-swapped bus voltage word
const INA219_VOLTAGE_LSB: f64 = 0.004;

/// Milliamps per bit of the current word, for the calibration on the UPS HAT
const INA219_CURRENT_LSB_MA: f64 = 0.1524;

/// Raw measurement from the gauge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryReading {
    /// Bus voltage in volts
    pub voltage: f64,
    /// Current in mA, positive while charging
    pub current_ma: f64,
}

impl BatteryReading {
    /// Convert INA219 register words as returned by an SMBus word read
    ///
    /// SMBus delivers the low byte first while the INA219 sends its registers
    /// MSB first, so the voltage word is byte-swapped before scaling. The
    /// current word is taken as-is and read as two's complement.
    ///
    /// # Arguments
    ///
    /// * `raw_voltage` - Word read from register 0x02
    /// * `raw_current` - Word read from register 0x04
    pub fn from_ina219_registers(raw_voltage: u16, raw_current: u16) -> Self {
        Self {
            voltage: f64::from(raw_voltage.swap_bytes()) * INA219_VOLTAGE_LSB,
            current_ma: f64::from(raw_current as i16) * INA219_CURRENT_LSB_MA,
        }
    }
}

/// Something that can measure the battery rail
#[cfg_attr(test, mockall::automock)]
pub trait FuelGauge: Send + Sync {
    fn read(&self) -> Result<BatteryReading>;
}

/// INA219 exposed by the `ina2xx` hwmon driver
#[derive(Debug, Clone)]
pub struct HwmonFuelGauge {
    dir: PathBuf,
}

impl HwmonFuelGauge {
    /// Gauge reading `in1_input` and `curr1_input` below `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn read_value(&self, name: &str) -> Result<f64> {
        let path = self.dir.join(name);
        let raw = fs::read_to_string(&path)?;
        raw.trim()
            .parse::<f64>()
            .map_err(|e| DashboardError::Probe(format!("{}: {}", path.display(), e)))
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

impl FuelGauge for HwmonFuelGauge {
    fn read(&self) -> Result<BatteryReading> {
        // hwmon reports millivolts and milliamps
        let voltage = self.read_value("in1_input")? / 1000.0;
        let current_ma = self.read_value("curr1_input")?;
        Ok(BatteryReading { voltage, current_ma })
    }
}

/// INA219 read directly over I2C
pub struct Ina219FuelGauge<I> {
    bus: Mutex<I>,
    address: u8,
}

impl Ina219FuelGauge<I2cdev> {
    /// Open the I2C character device, e.g. `/dev/i2c-1`
    ///
    /// # Errors
    ///
    /// Returns `Probe` if the device cannot be opened
    pub fn open(bus: &Path, address: u8) -> Result<Self> {
        let dev = I2cdev::new(bus)
            .map_err(|e| DashboardError::Probe(format!("{}: {}", bus.display(), e)))?;
        Ok(Self::new(dev, address))
    }
}

impl<I: I2c> Ina219FuelGauge<I> {
    pub fn new(bus: I, address: u8) -> Self {
        Self {
            bus: Mutex::new(bus),
            address,
        }
    }

    /// One SMBus-style word read: register pointer write, then two bytes
    fn read_word(bus: &mut I, address: u8, register: u8) -> Result<u16> {
        let mut buf = [0u8; 2];
        bus.write_read(address, &[register], &mut buf).map_err(|e| {
            DashboardError::Probe(format!(
                "INA219 0x{:02X} register 0x{:02X}: {:?}",
                address,
                register,
                e.kind()
            ))
        })?;
        Ok(u16::from_le_bytes(buf))
    }
}

impl<I: I2c + Send> FuelGauge for Ina219FuelGauge<I> {
    fn read(&self) -> Result<BatteryReading> {
        let mut bus = self
            .bus
            .lock()
            .map_err(|_| DashboardError::Probe("I2C bus lock poisoned".to_string()))?;

        let raw_voltage = Self::read_word(&mut bus, self.address, INA219_REG_BUS_VOLTAGE)?;
        let raw_current = Self::read_word(&mut bus, self.address, INA219_REG_CURRENT)?;
        Ok(BatteryReading::from_ina219_registers(raw_voltage, raw_current))
    }
}

/// Gauge whose device could not be opened; every read fails
#[derive(Debug, Clone)]
pub struct UnavailableFuelGauge {
    reason: String,
}

impl UnavailableFuelGauge {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl FuelGauge for UnavailableFuelGauge {
    fn read(&self) -> Result<BatteryReading> {
        Err(DashboardError::Probe(self.reason.clone()))
    }
}

/// Build the gauge selected by `battery.source`
///
/// An INA219 bus that cannot be opened yields an [`UnavailableFuelGauge`], so
/// the battery lines show the error placeholder instead of stopping startup.
pub fn open_fuel_gauge(config: &BatteryConfig) -> Box<dyn FuelGauge> {
    match config.source {
        BatterySource::Hwmon => Box::new(HwmonFuelGauge::new(&config.hwmon_path)),
        BatterySource::Ina219 => match Ina219FuelGauge::open(&config.i2c_bus, config.i2c_address) {
            Ok(gauge) => Box::new(gauge),
            Err(e) => {
                tracing::warn!("Battery gauge unavailable: {}", e);
                Box::new(UnavailableFuelGauge::new(e.to_string()))
            }
        },
    }
}

/// Charge direction shown next to the voltage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeState {
    Charging,
    Discharging,
    Idle,
    /// Gauge could not be read
    Error,
}

impl fmt::Display for ChargeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ChargeState::Charging => "CHG",
            ChargeState::Discharging => "DSCH",
            ChargeState::Idle => "---",
            ChargeState::Error => "Err",
        };
        f.write_str(text)
    }
}

/// Battery summary for the render loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryStatus {
    /// Estimated charge, 0 to 100
    pub percent: f64,
    pub voltage: f64,
    pub current_ma: f64,
    pub state: ChargeState,
}

impl BatteryStatus {
    /// Estimate charge linearly between the empty and full cell voltage
    pub fn from_reading(reading: BatteryReading, config: &BatteryConfig) -> Self {
        let span = config.full_voltage - config.empty_voltage;
        let percent = ((reading.voltage - config.empty_voltage) / span * 100.0).clamp(0.0, 100.0);

        let state = if reading.current_ma > CHARGE_THRESHOLD_MA {
            ChargeState::Charging
        } else if reading.current_ma < -CHARGE_THRESHOLD_MA {
            ChargeState::Discharging
        } else {
            ChargeState::Idle
        };

        Self {
            percent,
            voltage: reading.voltage,
            current_ma: reading.current_ma,
            state,
        }
    }

    /// Placeholder shown when the gauge cannot be read
    pub fn unavailable() -> Self {
        Self {
            percent: 0.0,
            voltage: 0.0,
            current_ma: 0.0,
            state: ChargeState::Error,
        }
    }

    /// Query `gauge`, degrading to [`BatteryStatus::unavailable`] on error
    pub fn query(gauge: &dyn FuelGauge, config: &BatteryConfig) -> Self {
        match gauge.read() {
            Ok(reading) => Self::from_reading(reading, config),
            Err(e) => {
                tracing::debug!("Battery gauge read failed: {}", e);
                Self::unavailable()
            }
        }
    }
}
