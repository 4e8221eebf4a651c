//! Peripheral link of the locker vending kiosk.
//!
//! This crate owns everything between the kiosk logic and the STM32
//! peripheral controller: the shared SPI bus, the interrupt line the
//! peripheral raises when it has something to say, and the reset line used
//! to recover it when it goes silent.
//!
//! # Layers
//!
//! - [`traits`]: [`BusDevice`] and [`InterruptLine`], the hardware seam.
//!   Implemented by the simulated devices in [`mock`] and by the
//!   `embedded-hal` adapters in [`hal`].
//! - [`transport`]: the [`Transport`], which serialises every bus exchange
//!   behind one lock and keeps the [`ActivityClock`] current.
//! - [`interpreter`]: decodes inbound frames into [`ControllerEvent`]s.
//! - [`watchdog`]: resets the peripheral after prolonged silence and alerts
//!   once if that did not help.
//! - [`manager`]: the [`Controller`] that runs the monitor and watchdog
//!   tasks and hands out a [`ControllerHandle`].
//!
//! # Degraded mode
//!
//! If the bus cannot be opened the transport is built disabled. Commands
//! then return [`BusError::NotInitialized`], nothing is spawned, and the
//! rest of the kiosk keeps running without the peripheral.
//!
//! ```
//! use lockervend_core::BusConfig;
//! use lockervend_hardware::{BusError, Transport};
//! use lockervend_hardware::mock::SimulatedBus;
//!
//! let transport: Transport<SimulatedBus> =
//!     Transport::open(Err(BusError::initialization_failed("no spidev")), BusConfig::default());
//! assert!(!transport.is_enabled());
//! ```

pub mod clock;
pub mod error;
pub mod hal;
pub mod interpreter;
pub mod manager;
pub mod mock;
pub mod monitor;
pub mod traits;
pub mod transport;
pub mod types;
pub mod watchdog;

// Re-export commonly used types for convenience
pub use clock::ActivityClock;
pub use error::{BusError, Result};
pub use hal::{HalBus, HalInterrupt};
pub use interpreter::{
    AlertKind, ControllerEvent, FrameDisposition, FrameInterpreter, NotificationSink, translate,
};
pub use manager::{Controller, ControllerHandle};
pub use traits::{BusDevice, InterruptLine};
pub use transport::Transport;
pub use types::DeviceInfo;
pub use watchdog::{Watchdog, WatchdogEvent, WatchdogState};
