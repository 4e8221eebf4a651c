//! Core constants for the locker vending controller.
//!
//! This module centralises every fixed value used by the bus transport, the
//! watchdog, and the MDB payment handshake. The configuration structs in
//! [`crate::config`] take their defaults from here, so a deployment can
//! override any of them without touching the code that consumes them.
//!
//! # Wire Layout
//!
//! Every SPI exchange with the peripheral controller moves exactly six bytes:
//!
//! ```text
//! [command, d0, d1, d2, d3, d4]
//!  ^^^^^^^  ^^^^^^^^^^^^^^^^^^
//!  code     payload, padded with 0xFF
//! ```
//!
//! # Usage
//!
//! ```
//! use lockervend_core::constants::*;
//!
//! assert_eq!(FRAME_LENGTH, 1 + PAYLOAD_LENGTH);
//! assert!(DEFAULT_WATCHDOG_POLL_MS < DEFAULT_WATCHDOG_TIMEOUT_MS);
//! ```

// ============================================================================
// Frame Layout
// ============================================================================

/// Total length of every SPI frame, in both directions.
pub const FRAME_LENGTH: usize = 6;

/// Number of payload bytes following the command byte.
pub const PAYLOAD_LENGTH: usize = FRAME_LENGTH - 1;

/// Filler byte for unused payload positions.
pub const PAD_BYTE: u8 = 0xFF;

/// Filler byte clocked out during the write phase of a read exchange.
pub const DUMMY_BYTE: u8 = 0xFF;

/// Locker id that addresses every locker at once (LED commands).
pub const ALL_LOCKERS: u8 = 0xFF;

/// Highest valid fan/heater bitmask; anything above is rejected.
pub const MAX_FAN_MASK: u8 = 63;

/// Fan mode byte that hands control back to the peripheral's thermostat.
pub const FAN_MODE_AUTO: u8 = 255;

// ============================================================================
// Bus Defaults
// ============================================================================

/// spidev node of the peripheral (bus 0, chip select 0).
pub const DEFAULT_SPI_DEVICE: &str = "/dev/spidev0.0";

/// GPIO character device carrying the interrupt and reset lines.
pub const DEFAULT_GPIO_CHIP: &str = "/dev/gpiochip0";

/// SPI clock speed in Hz.
pub const DEFAULT_SPI_SPEED_HZ: u32 = 1_600_000;

/// SPI mode (CPOL = 0, CPHA = 0).
pub const DEFAULT_SPI_MODE: u8 = 0;

/// BCM number of the pin the peripheral raises when it has data.
pub const DEFAULT_INTERRUPT_PIN: u8 = 17;

/// BCM number of the pin wired to the peripheral's reset input.
pub const DEFAULT_RESET_PIN: u8 = 27;

/// Delay between the dummy write phase and the read phase, in milliseconds.
pub const DEFAULT_READ_PHASE_DELAY_MS: u64 = 5;

/// Time the peripheral needs to digest a command before the next transfer.
pub const DEFAULT_COMMAND_SETTLE_MS: u64 = 50;

/// Duration the reset line is held low.
///
/// Deployed firmware notes mention 100 ms while the shipped controller held
/// the line for 2 s. The longer value is kept as default; tune it through
/// [`crate::config::BusConfig::reset_pulse`].
pub const DEFAULT_RESET_PULSE_MS: u64 = 2_000;

/// Interval at which the interrupt line is sampled for rising edges.
pub const DEFAULT_INTERRUPT_POLL_MS: u64 = 5;

// ============================================================================
// Watchdog Defaults
// ============================================================================

/// Bus silence tolerated before the peripheral is reset.
pub const DEFAULT_WATCHDOG_TIMEOUT_MS: u64 = 120_000;

/// Interval between watchdog checks.
pub const DEFAULT_WATCHDOG_POLL_MS: u64 = 5_000;

// ============================================================================
// MDB Defaults
// ============================================================================

/// Serial device of the MDB master interface.
pub const DEFAULT_MDB_PORT: &str = "/dev/ttyACM0";

/// Baud rate of the MDB master interface.
pub const DEFAULT_MDB_BAUD_RATE: u32 = 115_200;

/// Serial read timeout for a single line.
pub const DEFAULT_MDB_READ_TIMEOUT_MS: u64 = 1_000;

/// Attempts made to read a non-empty line before giving up.
pub const DEFAULT_MDB_READ_ATTEMPTS: u32 = 5;

/// Pause between empty read attempts.
pub const DEFAULT_MDB_READ_RETRY_MS: u64 = 100;

/// Iterations of the direct-vend confirmation loop.
pub const DEFAULT_MDB_CONFIRM_ITERATIONS: u32 = 10;

/// Pause between confirmation loop iterations.
pub const DEFAULT_MDB_CONFIRM_INTERVAL_MS: u64 = 1_000;

/// Iterations spent waiting for credit in normal vend mode.
pub const DEFAULT_MDB_CREDIT_WAIT_ITERATIONS: u32 = 30;

/// Lines read while waiting for INIT/IDLE during reader initialisation.
pub const DEFAULT_MDB_INIT_WAIT_LINES: u32 = 20;

/// Pause after opening the serial port so the interface settles.
pub const DEFAULT_MDB_STABILISE_MS: u64 = 1_000;

// ============================================================================
// Black-box Logs
// ============================================================================

/// Black-box log receiving peripheral (SPI) diagnostics.
pub const DEFAULT_STM32_BLACK_BOX: &str = "BLACK_BOX_STM32.txt";

/// Black-box log receiving payment (UART) diagnostics.
pub const DEFAULT_UART_BLACK_BOX: &str = "logs/BLACK_BOX_UART.txt";

// ============================================================================
// Event Delivery
// ============================================================================

/// Capacity of the controller event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 100;
