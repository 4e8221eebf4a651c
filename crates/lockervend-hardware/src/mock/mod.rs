//! Simulated device implementations for testing and development.
//!
//! These stand in for the SPI bus and the interrupt line when the
//! controller runs without a peripheral attached.

pub mod bus;
pub mod interrupt;

// Re-export commonly used types
pub use bus::{BusOp, SimulatedBus, SimulatedBusHandle};
pub use interrupt::{SimulatedInterrupt, SimulatedInterruptHandle};
