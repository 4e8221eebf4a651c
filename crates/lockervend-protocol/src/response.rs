//! Inbound response frames.
//!
//! The peripheral pushes a six-byte frame whenever it raises the interrupt
//! line. The first byte selects the meaning of the rest:
//!
//! ```text
//! | code | meaning              | fields                                        |
//! |------|----------------------|-----------------------------------------------|
//! | 0xF1 | locker fault         | b1 = locker, b2 = 50/100/150                  |
//! | 0xF2 | I2C device fault     | b1 = locker, b2 = 50/100                      |
//! | 0xF3 | climate fault        | b1 = object, b2 = 50/100                      |
//! | 0xF4 | climate reading      | b1 = sensor, b2..3 = temp×100, b4..5 = rh×100 |
//! | 0xF5 | resync request       | -                                             |
//! | 0xF6 | black-box error      | b1 = value, b2 = error code 1-8               |
//! ```
//!
//! Decoding is pure: it never blocks, never retries and never panics.
//!
//! # Examples
//!
//! ```
//! use lockervend_protocol::{InboundFrame, LockerFault, ResponseFrame};
//!
//! let frame = ResponseFrame::try_from(&[0xF1, 0x03, 150, 0, 0, 0][..]).unwrap();
//! match frame.decode().unwrap() {
//!     InboundFrame::LockerFault { locker, fault } => {
//!         assert_eq!(locker, 3);
//!         assert_eq!(fault, LockerFault::Jammed);
//!     }
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

use crate::blackbox::black_box_message;
use crate::error::FrameError;
use chrono::Utc;
use lockervend_core::ClimateReading;
use lockervend_core::constants::FRAME_LENGTH;
use std::fmt;

/// Inbound command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResponseCode {
    LockerFault = 0xF1,
    I2cFault = 0xF2,
    ClimateFault = 0xF3,
    ClimateReading = 0xF4,
    Resync = 0xF5,
    BlackBox = 0xF6,
}

impl TryFrom<u8> for ResponseCode {
    type Error = FrameError;

    fn try_from(byte: u8) -> Result<Self, FrameError> {
        match byte {
            0xF1 => Ok(Self::LockerFault),
            0xF2 => Ok(Self::I2cFault),
            0xF3 => Ok(Self::ClimateFault),
            0xF4 => Ok(Self::ClimateReading),
            0xF5 => Ok(Self::Resync),
            0xF6 => Ok(Self::BlackBox),
            other => Err(FrameError::UnknownCommand(other)),
        }
    }
}

/// Lock mechanism faults (0xF1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockerFault {
    /// Code 50: the lock was driven but did not release.
    NotOpened,
    /// Code 100: the door was left open.
    DoorOpen,
    /// Code 150: the mechanism is jammed; the customer must be told.
    Jammed,
    Other(u8),
}

impl LockerFault {
    pub fn from_code(code: u8) -> Self {
        match code {
            50 => Self::NotOpened,
            100 => Self::DoorOpen,
            150 => Self::Jammed,
            other => Self::Other(other),
        }
    }

    pub fn describe(self, locker: u8) -> String {
        match self {
            Self::NotOpened => format!("Locker {locker}: lock did not open"),
            Self::DoorOpen => format!("Locker {locker}: door left open"),
            Self::Jammed => format!("Locker {locker}: lock jammed"),
            Self::Other(code) => format!("Locker {locker}: fault code {code}"),
        }
    }
}

/// Faults of the per-locker I2C expanders (0xF2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum I2cFault {
    /// Code 50.
    NoResponse,
    /// Code 100.
    BusError,
    Other(u8),
}

impl I2cFault {
    pub fn from_code(code: u8) -> Self {
        match code {
            50 => Self::NoResponse,
            100 => Self::BusError,
            other => Self::Other(other),
        }
    }

    pub fn describe(self, locker: u8) -> String {
        match self {
            Self::NoResponse => format!("I2C device of locker {locker} not responding"),
            Self::BusError => format!("I2C bus error on locker {locker}"),
            Self::Other(code) => format!("I2C device of locker {locker}: fault code {code}"),
        }
    }
}

/// Faults of the ventilation and heating hardware (0xF3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClimateFault {
    /// Code 50.
    Fan,
    /// Code 100.
    Heater,
    Other(u8),
}

impl ClimateFault {
    pub fn from_code(code: u8) -> Self {
        match code {
            50 => Self::Fan,
            100 => Self::Heater,
            other => Self::Other(other),
        }
    }

    pub fn describe(self, object: u8) -> String {
        match self {
            Self::Fan => format!("Fan {object} failure"),
            Self::Heater => format!("Heater {object} failure"),
            Self::Other(code) => format!("Climate object {object}: fault code {code}"),
        }
    }
}

/// Typed meaning of a decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    LockerFault { locker: u8, fault: LockerFault },
    I2cFault { locker: u8, fault: I2cFault },
    ClimateFault { object: u8, fault: ClimateFault },
    ClimateReading(ClimateReading),
    ResyncRequest,
    BlackBox { value: u8, code: u8, message: String },
}

/// Exactly six bytes received from the peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseFrame([u8; FRAME_LENGTH]);

impl ResponseFrame {
    pub fn new(bytes: [u8; FRAME_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Build a climate frame, the inverse of decoding 0xF4.
    ///
    /// Values are carried as hundredths, so anything finer than 0.01 is
    /// rounded. Temperatures are signed, humidity is not.
    pub fn climate(sensor_id: u8, temperature: f32, humidity: f32) -> Self {
        let temp = ((temperature * 100.0).round() as i16).to_be_bytes();
        let rh = ((humidity * 100.0).round() as u16).to_be_bytes();
        Self([
            ResponseCode::ClimateReading as u8,
            sensor_id,
            temp[0],
            temp[1],
            rh[0],
            rh[1],
        ])
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_LENGTH] {
        &self.0
    }

    pub fn command(&self) -> u8 {
        self.0[0]
    }

    /// Interpret the frame according to its command byte.
    ///
    /// # Errors
    ///
    /// Returns `FrameError::UnknownCommand` for codes outside 0xF1-0xF6.
    pub fn decode(&self) -> Result<InboundFrame, FrameError> {
        let [command, b1, b2, b3, b4, b5] = self.0;

        let frame = match ResponseCode::try_from(command)? {
            ResponseCode::LockerFault => InboundFrame::LockerFault {
                locker: b1,
                fault: LockerFault::from_code(b2),
            },
            ResponseCode::I2cFault => InboundFrame::I2cFault {
                locker: b1,
                fault: I2cFault::from_code(b2),
            },
            ResponseCode::ClimateFault => InboundFrame::ClimateFault {
                object: b1,
                fault: ClimateFault::from_code(b2),
            },
            ResponseCode::ClimateReading => InboundFrame::ClimateReading(ClimateReading {
                sensor_id: b1,
                temperature: f32::from(i16::from_be_bytes([b2, b3])) / 100.0,
                humidity: f32::from(u16::from_be_bytes([b4, b5])) / 100.0,
                timestamp: Utc::now(),
            }),
            ResponseCode::Resync => InboundFrame::ResyncRequest,
            ResponseCode::BlackBox => InboundFrame::BlackBox {
                value: b1,
                code: b2,
                message: black_box_message(b1, b2),
            },
        };

        Ok(frame)
    }
}

impl TryFrom<&[u8]> for ResponseFrame {
    type Error = FrameError;

    fn try_from(bytes: &[u8]) -> Result<Self, FrameError> {
        let array: [u8; FRAME_LENGTH] = bytes
            .try_into()
            .map_err(|_| FrameError::WrongLength { len: bytes.len() })?;
        Ok(Self(array))
    }
}

impl fmt::Display for ResponseFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", lockervend_core::hex_bytes(&self.0))
    }
}
