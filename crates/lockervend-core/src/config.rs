//! Controller configuration.
//!
//! Every tunable of the bus, watchdog, payment reader and black-box logs
//! lives in one of the structs below. All of them implement [`Default`]
//! with the values from [`crate::constants`], and all of them can be read
//! from a JSON file in which any field may be omitted:
//!
//! ```json
//! {
//!   "bus": { "reset_pulse": 100 },
//!   "mdb": { "port": "/dev/ttyUSB1" }
//! }
//! ```
//!
//! Durations are written as integer milliseconds.

use crate::{Result, constants::*, error::Error};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Serde adapter storing a [`Duration`] as whole milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// SPI bus and GPIO wiring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// spidev node the peripheral sits on.
    pub spi_device: PathBuf,

    /// GPIO chip holding the interrupt and reset lines.
    pub gpio_chip: PathBuf,

    /// SPI clock in Hz.
    pub speed_hz: u32,

    /// SPI mode (0-3).
    pub spi_mode: u8,

    /// Pin the peripheral raises when a response is waiting.
    pub interrupt_pin: u8,

    /// Pin wired to the peripheral reset input.
    pub reset_pin: u8,

    /// Delay between dummy write phase and read phase.
    #[serde(with = "duration_ms")]
    pub read_phase_delay: Duration,

    /// Delay held under the bus lock after each outbound command.
    #[serde(with = "duration_ms")]
    pub command_settle: Duration,

    /// How long the reset line is held low.
    #[serde(with = "duration_ms")]
    pub reset_pulse: Duration,

    /// Sampling interval of the interrupt line.
    #[serde(with = "duration_ms")]
    pub interrupt_poll_interval: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            spi_device: PathBuf::from(DEFAULT_SPI_DEVICE),
            gpio_chip: PathBuf::from(DEFAULT_GPIO_CHIP),
            speed_hz: DEFAULT_SPI_SPEED_HZ,
            spi_mode: DEFAULT_SPI_MODE,
            interrupt_pin: DEFAULT_INTERRUPT_PIN,
            reset_pin: DEFAULT_RESET_PIN,
            read_phase_delay: Duration::from_millis(DEFAULT_READ_PHASE_DELAY_MS),
            command_settle: Duration::from_millis(DEFAULT_COMMAND_SETTLE_MS),
            reset_pulse: Duration::from_millis(DEFAULT_RESET_PULSE_MS),
            interrupt_poll_interval: Duration::from_millis(DEFAULT_INTERRUPT_POLL_MS),
        }
    }
}

/// Bus-silence watchdog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Silence tolerated before a reset, and again before an alert.
    #[serde(with = "duration_ms")]
    pub timeout: Duration,

    #[serde(with = "duration_ms")]
    pub poll_interval: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_WATCHDOG_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_WATCHDOG_POLL_MS),
        }
    }
}

/// Cashless reader link and handshake bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MdbConfig {
    pub port: String,
    pub baud_rate: u32,

    #[serde(with = "duration_ms")]
    pub read_timeout: Duration,

    /// Reads attempted before a line counts as missing.
    pub read_attempts: u32,

    #[serde(with = "duration_ms")]
    pub read_retry_delay: Duration,

    /// Confirmation loop length in direct vend mode.
    pub confirm_iterations: u32,

    #[serde(with = "duration_ms")]
    pub confirm_interval: Duration,

    /// Iterations spent waiting for inserted credit in normal vend mode.
    pub credit_wait_iterations: u32,

    /// Lines read while waiting for INIT or IDLE during initialisation.
    pub init_wait_lines: u32,

    /// Pause after the port is (re)opened.
    #[serde(with = "duration_ms")]
    pub stabilise_delay: Duration,
}

impl Default for MdbConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_MDB_PORT.to_string(),
            baud_rate: DEFAULT_MDB_BAUD_RATE,
            read_timeout: Duration::from_millis(DEFAULT_MDB_READ_TIMEOUT_MS),
            read_attempts: DEFAULT_MDB_READ_ATTEMPTS,
            read_retry_delay: Duration::from_millis(DEFAULT_MDB_READ_RETRY_MS),
            confirm_iterations: DEFAULT_MDB_CONFIRM_ITERATIONS,
            confirm_interval: Duration::from_millis(DEFAULT_MDB_CONFIRM_INTERVAL_MS),
            credit_wait_iterations: DEFAULT_MDB_CREDIT_WAIT_ITERATIONS,
            init_wait_lines: DEFAULT_MDB_INIT_WAIT_LINES,
            stabilise_delay: Duration::from_millis(DEFAULT_MDB_STABILISE_MS),
        }
    }
}

/// Locations of the append-only diagnostic logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlackBoxConfig {
    pub stm32_path: PathBuf,
    pub uart_path: PathBuf,
}

impl Default for BlackBoxConfig {
    fn default() -> Self {
        Self {
            stm32_path: PathBuf::from(DEFAULT_STM32_BLACK_BOX),
            uart_path: PathBuf::from(DEFAULT_UART_BLACK_BOX),
        }
    }
}

/// Complete controller configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub bus: BusConfig,
    pub watchdog: WatchdogConfig,
    pub mdb: MdbConfig,
    pub black_box: BlackBoxConfig,
}

impl ControllerConfig {
    /// Parse a configuration from JSON text and validate it.
    ///
    /// # Errors
    /// Returns `Error::ConfigParse` for malformed JSON and `Error::Config`
    /// when [`validate`](Self::validate) rejects the result.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a configuration file.
    ///
    /// # Errors
    /// Returns `Error::Io` if the file cannot be read, otherwise the same
    /// errors as [`from_json_str`](Self::from_json_str).
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Reject values that would stall or spin the controller.
    ///
    /// # Errors
    /// Returns `Error::Config` describing the first offending field.
    pub fn validate(&self) -> Result<()> {
        let non_zero = [
            ("watchdog.timeout", self.watchdog.timeout),
            ("watchdog.poll_interval", self.watchdog.poll_interval),
            ("bus.interrupt_poll_interval", self.bus.interrupt_poll_interval),
            ("mdb.read_timeout", self.mdb.read_timeout),
        ];
        for (name, value) in non_zero {
            if value.is_zero() {
                return Err(Error::Config(format!("{name} must be greater than zero")));
            }
        }

        if self.watchdog.poll_interval >= self.watchdog.timeout {
            return Err(Error::Config(
                "watchdog.poll_interval must be shorter than watchdog.timeout".to_string(),
            ));
        }

        if self.bus.spi_mode > 3 {
            return Err(Error::Config(format!(
                "bus.spi_mode must be 0-3, got {}",
                self.bus.spi_mode
            )));
        }

        if self.mdb.read_attempts == 0 || self.mdb.confirm_iterations == 0 {
            return Err(Error::Config(
                "mdb.read_attempts and mdb.confirm_iterations must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_validate() {
        ControllerConfig::default().validate().unwrap();
    }

    #[test]
    fn test_default_values() {
        let config = ControllerConfig::default();
        assert_eq!(config.bus.speed_hz, 1_600_000);
        assert_eq!(config.bus.interrupt_pin, 17);
        assert_eq!(config.watchdog.timeout, Duration::from_secs(120));
        assert_eq!(config.watchdog.poll_interval, Duration::from_secs(5));
        assert_eq!(config.mdb.baud_rate, 115_200);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            ControllerConfig::from_json_str(r#"{ "bus": { "reset_pulse": 100 } }"#).unwrap();
        assert_eq!(config.bus.reset_pulse, Duration::from_millis(100));
        assert_eq!(config.bus.speed_hz, DEFAULT_SPI_SPEED_HZ);
        assert_eq!(config.mdb, MdbConfig::default());
    }

    #[test]
    fn test_board_device_paths() {
        let defaults = BusConfig::default();
        assert_eq!(defaults.spi_device, PathBuf::from("/dev/spidev0.0"));
        assert_eq!(defaults.gpio_chip, PathBuf::from("/dev/gpiochip0"));

        let config = ControllerConfig::from_json_str(
            r#"{ "bus": { "spi_device": "/dev/spidev1.1", "reset_pin": 22 } }"#,
        )
        .unwrap();
        assert_eq!(config.bus.spi_device, PathBuf::from("/dev/spidev1.1"));
        assert_eq!(config.bus.gpio_chip, defaults.gpio_chip);
        assert_eq!(config.bus.reset_pin, 22);
    }

    #[test]
    fn test_empty_json_is_default() {
        let config = ControllerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ControllerConfig::default());
    }

    #[test]
    fn test_malformed_json() {
        let result = ControllerConfig::from_json_str("{ bus: ");
        assert!(matches!(result, Err(Error::ConfigParse(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = ControllerConfig::from_json_str(r#"{ "watchdog": { "timeout": 0 } }"#);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_poll_not_shorter_than_timeout_rejected() {
        let result = ControllerConfig::from_json_str(
            r#"{ "watchdog": { "timeout": 1000, "poll_interval": 1000 } }"#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_bad_spi_mode_rejected() {
        let result = ControllerConfig::from_json_str(r#"{ "bus": { "spi_mode": 4 } }"#);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "mdb": {{ "port": "/dev/ttyUSB1" }} }}"#).unwrap();

        let config = ControllerConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.mdb.port, "/dev/ttyUSB1");
    }

    #[test]
    fn test_missing_file() {
        let result = ControllerConfig::from_json_file("/nonexistent/lockervend.json");
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_serialize_durations_as_millis() {
        let json = serde_json::to_value(WatchdogConfig::default()).unwrap();
        assert_eq!(json["timeout"], 120_000);
        assert_eq!(json["poll_interval"], 5_000);
    }
}
