//! Linux board wiring: spidev for the bus, GPIO character device lines for
//! the interrupt and reset pins.

use lockervend_core::BusConfig;
use lockervend_hardware::{BusError, DeviceInfo, HalBus, HalInterrupt, Result};
use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::{CdevPin, SpidevDevice};
use tracing::debug;

/// Bus device on a Linux board.
pub type BoardBus = HalBus<SpidevDevice, CdevPin>;

/// Interrupt line on a Linux board.
pub type BoardInterrupt = HalInterrupt<CdevPin>;

const CONSUMER: &str = "lockervend";

/// Kernel flags for an SPI mode number.
pub fn spi_mode_flags(mode: u8) -> Result<SpiModeFlags> {
    match mode {
        0 => Ok(SpiModeFlags::SPI_MODE_0),
        1 => Ok(SpiModeFlags::SPI_MODE_1),
        2 => Ok(SpiModeFlags::SPI_MODE_2),
        3 => Ok(SpiModeFlags::SPI_MODE_3),
        other => Err(BusError::initialization_failed(format!(
            "SPI mode {other} out of range"
        ))),
    }
}

fn init_error(device: &str, error: impl std::fmt::Debug) -> BusError {
    BusError::initialization_failed(format!("{device}: {error:?}"))
}

/// Open the spidev node, the reset line and the interrupt line.
///
/// # Errors
///
/// Returns `BusError::InitializationFailed` naming the first device that
/// could not be opened or configured.
pub fn open(config: &BusConfig) -> Result<(BoardBus, BoardInterrupt)> {
    let spi_path = config.spi_device.display().to_string();
    let mut spi = SpidevDevice::open(&config.spi_device).map_err(|e| init_error(&spi_path, e))?;
    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(config.speed_hz)
        .mode(spi_mode_flags(config.spi_mode)?)
        .build();
    spi.configure(&options).map_err(|e| init_error(&spi_path, e))?;

    let chip_path = config.gpio_chip.display().to_string();
    let mut chip = Chip::new(&config.gpio_chip).map_err(|e| init_error(&chip_path, e))?;

    // Released (high) from the moment the line is claimed.
    let reset_handle = chip
        .get_line(u32::from(config.reset_pin))
        .and_then(|line| line.request(LineRequestFlags::OUTPUT, 1, CONSUMER))
        .map_err(|e| init_error(&chip_path, e))?;
    let reset = CdevPin::new(reset_handle).map_err(|e| init_error(&chip_path, e))?;

    let interrupt_handle = chip
        .get_line(u32::from(config.interrupt_pin))
        .and_then(|line| line.request(LineRequestFlags::INPUT, 0, CONSUMER))
        .map_err(|e| init_error(&chip_path, e))?;
    let interrupt = CdevPin::new(interrupt_handle).map_err(|e| init_error(&chip_path, e))?;

    debug!(
        "Claimed reset line {} and interrupt line {} on {}",
        config.reset_pin, config.interrupt_pin, chip_path
    );

    let info = DeviceInfo::new(spi_path, "spidev").with_speed_hz(config.speed_hz);
    let bus = HalBus::new(spi, reset, info)?;
    Ok((bus, HalInterrupt::new(interrupt)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_spi_mode_flags() {
        assert_eq!(spi_mode_flags(0).unwrap(), SpiModeFlags::SPI_MODE_0);
        assert_eq!(spi_mode_flags(3).unwrap(), SpiModeFlags::SPI_MODE_3);
        assert!(matches!(
            spi_mode_flags(4),
            Err(BusError::InitializationFailed { .. })
        ));
    }

    #[test]
    fn test_missing_spidev_is_initialization_failure() {
        let config = BusConfig {
            spi_device: PathBuf::from("/dev/lockervend-no-such-spidev"),
            ..BusConfig::default()
        };

        match open(&config) {
            Err(BusError::InitializationFailed { message }) => {
                assert!(message.contains("lockervend-no-such-spidev"));
            }
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("opened a device that does not exist"),
        }
    }
}
