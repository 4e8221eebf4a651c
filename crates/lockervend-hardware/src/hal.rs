//! `embedded-hal` backed devices.
//!
//! Any board support crate that provides an `embedded-hal` 1.0 `SpiDevice`
//! plus GPIO pins (linux-embedded-hal, rppal, ...) can drive the real
//! peripheral through these adapters. Chip select is handled by the
//! `SpiDevice` itself.

use crate::error::{BusError, Result};
use crate::traits::{BusDevice, InterruptLine};
use crate::types::DeviceInfo;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;

/// SPI bus plus the active-low reset line of the peripheral.
pub struct HalBus<SPI, RST> {
    spi: SPI,
    reset: RST,
    info: DeviceInfo,
}

impl<SPI, RST> HalBus<SPI, RST>
where
    SPI: SpiDevice,
    RST: OutputPin,
{
    /// Wrap an SPI device and reset pin.
    ///
    /// The reset line is driven high (released) immediately.
    ///
    /// # Errors
    ///
    /// Returns `BusError::Pin` if the reset line cannot be driven.
    pub fn new(spi: SPI, mut reset: RST, info: DeviceInfo) -> Result<Self> {
        reset
            .set_high()
            .map_err(|e| BusError::pin("reset", format!("{e:?}")))?;
        Ok(Self { spi, reset, info })
    }
}

impl<SPI, RST> BusDevice for HalBus<SPI, RST>
where
    SPI: SpiDevice + Send,
    RST: OutputPin + Send,
{
    fn write(&mut self, frame: &[u8]) -> Result<()> {
        self.spi
            .write(frame)
            .map_err(|e| BusError::transfer_failed(format!("{e:?}")))
    }

    fn transfer(&mut self, write: &[u8], read: &mut [u8]) -> Result<()> {
        self.spi
            .transfer(read, write)
            .map_err(|e| BusError::transfer_failed(format!("{e:?}")))
    }

    fn set_reset(&mut self, asserted: bool) -> Result<()> {
        let result = if asserted {
            self.reset.set_low()
        } else {
            self.reset.set_high()
        };
        result.map_err(|e| BusError::pin("reset", format!("{e:?}")))
    }

    fn info(&self) -> DeviceInfo {
        self.info.clone()
    }
}

/// Interrupt input pin.
pub struct HalInterrupt<P> {
    pin: P,
}

impl<P: InputPin> HalInterrupt<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }
}

impl<P: InputPin + Send> InterruptLine for HalInterrupt<P> {
    fn is_high(&mut self) -> Result<bool> {
        self.pin
            .is_high()
            .map_err(|e| BusError::pin("interrupt", format!("{e:?}")))
    }
}
