//! Bus device trait definitions.
//!
//! These traits are the seam between the controller and the physical
//! hardware. The [`Transport`](crate::transport::Transport) serialises all
//! access to a [`BusDevice`]; the GPIO monitor owns the [`InterruptLine`].
//! Two implementation families exist:
//!
//! - [`mock`](crate::mock): simulated devices for development and tests.
//! - [`hal`](crate::hal): adapters over any `embedded-hal` 1.0 SPI device and
//!   GPIO pins.
//!
//! The methods are blocking. An SPI transfer of six bytes completes in
//! microseconds, and `embedded-hal` drivers are synchronous, so the
//! transport calls them directly while holding its lock and only awaits for
//! the deliberate delays between phases.

use crate::error::Result;
use crate::types::DeviceInfo;

/// The shared SPI bus plus the peripheral reset line.
///
/// # Examples
///
/// ```
/// use lockervend_hardware::traits::BusDevice;
/// use lockervend_hardware::error::Result;
///
/// fn exchange<B: BusDevice>(bus: &mut B) -> Result<[u8; 6]> {
///     bus.write(&[0xFF; 6])?;
///     let mut reply = [0u8; 6];
///     bus.transfer(&[0x00; 6], &mut reply)?;
///     Ok(reply)
/// }
/// ```
pub trait BusDevice: Send {
    /// Clock a frame out to the peripheral, discarding what comes back.
    ///
    /// # Errors
    ///
    /// Returns `BusError::TransferFailed` if the transfer did not complete.
    fn write(&mut self, frame: &[u8]) -> Result<()>;

    /// Full-duplex transfer: clock `write` out while filling `read`.
    ///
    /// # Errors
    ///
    /// Returns `BusError::TransferFailed` if the transfer did not complete.
    fn transfer(&mut self, write: &[u8], read: &mut [u8]) -> Result<()>;

    /// Drive the reset line. `true` holds the peripheral in reset.
    ///
    /// # Errors
    ///
    /// Returns `BusError::Pin` if the line cannot be driven.
    fn set_reset(&mut self, asserted: bool) -> Result<()>;

    /// Describe the backend for logs.
    fn info(&self) -> DeviceInfo;
}

/// The line the peripheral raises when it has a frame waiting.
pub trait InterruptLine: Send {
    /// Sample the current level of the line.
    ///
    /// # Errors
    ///
    /// Returns `BusError::Pin` if the line cannot be read.
    fn is_high(&mut self) -> Result<bool>;
}
