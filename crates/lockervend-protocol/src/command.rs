//! Outbound command frames.
//!
//! Every command sent to the peripheral controller occupies exactly six
//! bytes. Unused payload positions are padded with `0xFF`:
//!
//! ```text
//! | command | d0     | d1       | d2       | d3   | d4   | meaning          |
//! |---------|--------|----------|----------|------|------|------------------|
//! | 0x01    | locker | R        | G        | B    | mode | set LED colour   |
//! | 0x02    | locker | price_hi | price_lo | 0xFF | 0xFF | set price        |
//! | 0x03    | locker | 0xFF     | 0xFF     | 0xFF | 0xFF | open locker      |
//! | 0x04    | mode   | 0xFF     | 0xFF     | 0xFF | 0xFF | set fan/heat mode|
//! ```
//!
//! # Examples
//!
//! ```
//! use lockervend_protocol::CommandFrame;
//!
//! let frame = CommandFrame::price(3, 250);
//! assert_eq!(frame.to_bytes(), [0x02, 3, 0x00, 0xFA, 0xFF, 0xFF]);
//! ```

use crate::error::{ProtocolError, Result};
use lockervend_core::constants::{FRAME_LENGTH, PAD_BYTE, PAYLOAD_LENGTH};
use lockervend_core::{FanMode, Rgb};
use std::fmt;

/// Outbound command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandCode {
    SetLedColor = 0x01,
    SetPrice = 0x02,
    OpenLocker = 0x03,
    SetFanMode = 0x04,
}

impl CommandCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::SetLedColor => "set LED color",
            Self::SetPrice => "set price",
            Self::OpenLocker => "open locker",
            Self::SetFanMode => "set fan mode",
        }
    }
}

impl TryFrom<u8> for CommandCode {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self> {
        match byte {
            0x01 => Ok(Self::SetLedColor),
            0x02 => Ok(Self::SetPrice),
            0x03 => Ok(Self::OpenLocker),
            0x04 => Ok(Self::SetFanMode),
            other => Err(ProtocolError::UnknownCommand(other)),
        }
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.as_u8())
    }
}

/// LED animation mode, last byte of a colour command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedMode {
    /// Steady colour.
    #[default]
    Normal,

    Blink,

    Off,
}

impl LedMode {
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Normal => 0xFF,
            Self::Blink => 0x01,
            Self::Off => 0x00,
        }
    }
}

/// A single outbound command.
///
/// Immutable once built; the payload is always padded to five bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame {
    command: u8,
    payload: [u8; PAYLOAD_LENGTH],
}

impl CommandFrame {
    /// Build a frame from a raw command byte and up to five data bytes.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::PayloadTooLong` if `data` exceeds five bytes.
    pub fn new(command: u8, data: &[u8]) -> Result<Self> {
        if data.len() > PAYLOAD_LENGTH {
            return Err(ProtocolError::PayloadTooLong {
                len: data.len(),
                max: PAYLOAD_LENGTH,
            });
        }

        let mut payload = [PAD_BYTE; PAYLOAD_LENGTH];
        payload[..data.len()].copy_from_slice(data);
        Ok(Self { command, payload })
    }

    fn fixed(code: CommandCode, payload: [u8; PAYLOAD_LENGTH]) -> Self {
        Self {
            command: code.as_u8(),
            payload,
        }
    }

    /// Set the LED colour of one locker, or of all lockers with id 255.
    pub fn led_color(locker: u8, color: Rgb, mode: LedMode) -> Self {
        Self::fixed(
            CommandCode::SetLedColor,
            [locker, color.r, color.g, color.b, mode.as_byte()],
        )
    }

    /// Set the displayed price of a locker, in cents.
    pub fn price(locker: u8, price_cents: u16) -> Self {
        let [hi, lo] = price_cents.to_be_bytes();
        Self::fixed(CommandCode::SetPrice, [locker, hi, lo, PAD_BYTE, PAD_BYTE])
    }

    /// Release the lock of a locker.
    pub fn open_locker(locker: u8) -> Self {
        Self::fixed(
            CommandCode::OpenLocker,
            [locker, PAD_BYTE, PAD_BYTE, PAD_BYTE, PAD_BYTE],
        )
    }

    /// Select fans/heaters or hand control to the thermostat.
    pub fn fan_mode(mode: FanMode) -> Self {
        Self::fixed(
            CommandCode::SetFanMode,
            [mode.as_byte(), PAD_BYTE, PAD_BYTE, PAD_BYTE, PAD_BYTE],
        )
    }

    pub fn command(&self) -> u8 {
        self.command
    }

    /// Known command code, if the command byte is one.
    pub fn code(&self) -> Option<CommandCode> {
        CommandCode::try_from(self.command).ok()
    }

    pub fn payload(&self) -> &[u8; PAYLOAD_LENGTH] {
        &self.payload
    }

    /// Wire representation.
    pub fn to_bytes(&self) -> [u8; FRAME_LENGTH] {
        let mut bytes = [0u8; FRAME_LENGTH];
        bytes[0] = self.command;
        bytes[1..].copy_from_slice(&self.payload);
        bytes
    }
}

impl fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", lockervend_core::hex_bytes(&self.to_bytes()))
    }
}
