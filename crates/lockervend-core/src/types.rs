use crate::{
    Result,
    constants::{ALL_LOCKERS, FAN_MODE_AUTO, MAX_FAN_MASK},
    error::Error,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Locker identifier as addressed on the peripheral bus (1-254).
///
/// 0 is never used by the firmware and 255 is reserved for broadcast
/// LED commands, see [`ALL_LOCKERS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct LockerId(u8);

impl LockerId {
    /// Create a new locker id with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidLockerId` for 0 and for the broadcast id 255.
    pub fn new(id: u8) -> Result<Self> {
        if id == 0 || id == ALL_LOCKERS {
            return Err(Error::InvalidLockerId(id));
        }
        Ok(LockerId(id))
    }

    /// Get the raw locker id as u8.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for LockerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for LockerId {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self> {
        LockerId::new(id)
    }
}

impl From<LockerId> for u8 {
    fn from(id: LockerId) -> u8 {
        id.0
    }
}

/// Fan/heater operating mode.
///
/// The peripheral accepts a 6-bit mask selecting individual fans and heaters,
/// or 255 to let its own thermostat decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FanMode {
    /// Thermostat-controlled.
    #[default]
    Auto,

    /// Explicit bitmask (0-63).
    Manual(u8),
}

impl FanMode {
    /// Create a manual mode from a bitmask.
    ///
    /// # Errors
    /// Returns `Error::InvalidFanMask` if the mask exceeds 63.
    pub fn manual(mask: u8) -> Result<Self> {
        if mask > MAX_FAN_MASK {
            return Err(Error::InvalidFanMask(mask));
        }
        Ok(FanMode::Manual(mask))
    }

    /// Wire byte for the fan-mode command.
    #[must_use]
    pub fn as_byte(&self) -> u8 {
        match self {
            FanMode::Auto => FAN_MODE_AUTO,
            FanMode::Manual(mask) => *mask,
        }
    }
}

impl TryFrom<u8> for FanMode {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self> {
        if byte == FAN_MODE_AUTO {
            Ok(FanMode::Auto)
        } else {
            FanMode::manual(byte)
        }
    }
}

impl From<FanMode> for u8 {
    fn from(mode: FanMode) -> u8 {
        mode.as_byte()
    }
}

/// RGB colour of a locker's LED strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Climate sample decoded from a 0xF4 frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateReading {
    /// Sensor that produced the sample.
    pub sensor_id: u8,

    /// Temperature in degrees Celsius.
    pub temperature: f32,

    /// Relative humidity in percent.
    pub humidity: f32,

    /// When the frame was decoded.
    pub timestamp: DateTime<Utc>,
}

/// One line of a black-box log.
///
/// Entries are append-only: once written they are never touched again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackBoxEntry {
    pub timestamp: DateTime<Utc>,

    /// Space-separated hex of the frame that triggered the entry, if any.
    pub raw_frame_hex: Option<String>,

    pub message: String,
}

impl BlackBoxEntry {
    /// Entry describing a raw frame received from the peripheral.
    pub fn frame(raw: &[u8], message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            raw_frame_hex: Some(hex_bytes(raw)),
            message: message.into(),
        }
    }

    /// Entry describing a controller-side event with no frame attached.
    pub fn event(message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            raw_frame_hex: None,
            message: message.into(),
        }
    }

    /// Render the entry as a single log line, newline included.
    #[must_use]
    pub fn to_line(&self) -> String {
        let ts = self.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        match &self.raw_frame_hex {
            Some(hex) => format!("{ts}, {hex}, {}\n", self.message),
            None => format!("{ts} – {}\n", self.message),
        }
    }
}

/// Format bytes as space-separated upper-case hex pairs.
#[must_use]
pub fn hex_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// A single purchase attempt.
///
/// Owned by the checkout workflow for the duration of one attempt and
/// dropped once it concludes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendTransaction {
    pub id: Uuid,
    pub locker_id: LockerId,

    /// Price in cents.
    pub price: u32,

    /// Product code reported to the cashless reader.
    pub product_code: u16,
}

impl VendTransaction {
    /// Create a transaction with a fresh id.
    ///
    /// # Errors
    /// Returns `Error::InvalidPrice` for a zero price.
    pub fn new(locker_id: LockerId, price: u32, product_code: u16) -> Result<Self> {
        if price == 0 {
            return Err(Error::InvalidPrice("price must be greater than zero".to_string()));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            locker_id,
            price,
            product_code,
        })
    }

    /// Price formatted in currency units, as the MDB interface expects it.
    #[must_use]
    pub fn amount(&self) -> String {
        format!("{}.{:02}", self.price / 100, self.price % 100)
    }
}

/// Everything the peripheral must be told after it restarts.
///
/// A 0xF5 frame asks the controller to push all of this again.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LockerSettings {
    /// Price in cents per locker.
    pub prices: BTreeMap<LockerId, u16>,

    /// LED colour per locker.
    pub colors: BTreeMap<LockerId, Rgb>,

    pub fan_mode: FanMode,
}

impl LockerSettings {
    /// Twelve lockers at 5.00 with white LEDs, thermostat fans.
    #[must_use]
    pub fn kiosk_defaults() -> Self {
        let mut settings = Self::default();
        for id in 1..=12u8 {
            let locker = LockerId(id);
            settings.prices.insert(locker, 500);
            settings.colors.insert(locker, Rgb::new(255, 255, 255));
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1)]
    #[case(12)]
    #[case(254)]
    fn test_locker_id_valid(#[case] id: u8) {
        assert_eq!(LockerId::new(id).unwrap().as_u8(), id);
    }

    #[rstest]
    #[case(0)]
    #[case(255)]
    fn test_locker_id_invalid(#[case] id: u8) {
        assert!(matches!(LockerId::new(id), Err(Error::InvalidLockerId(_))));
    }

    #[rstest]
    #[case(0, FanMode::Manual(0))]
    #[case(63, FanMode::Manual(63))]
    #[case(255, FanMode::Auto)]
    fn test_fan_mode_from_byte(#[case] byte: u8, #[case] expected: FanMode) {
        let mode = FanMode::try_from(byte).unwrap();
        assert_eq!(mode, expected);
        assert_eq!(mode.as_byte(), byte);
    }

    #[rstest]
    #[case(64)]
    #[case(254)]
    fn test_fan_mode_invalid(#[case] byte: u8) {
        assert!(matches!(FanMode::try_from(byte), Err(Error::InvalidFanMask(_))));
    }

    #[test]
    fn test_hex_bytes() {
        assert_eq!(hex_bytes(&[0xF6, 0x07, 0x05, 0, 0, 0]), "F6 07 05 00 00 00");
        assert_eq!(hex_bytes(&[]), "");
    }

    #[test]
    fn test_black_box_frame_line() {
        let entry = BlackBoxEntry::frame(&[0xF6, 0x01], "boom");
        let line = entry.to_line();
        assert!(line.ends_with(", F6 01, boom\n"));
    }

    #[test]
    fn test_black_box_event_line() {
        let entry = BlackBoxEntry::event("silence");
        let line = entry.to_line();
        assert!(line.ends_with(" – silence\n"));
        assert!(!line.contains(", "));
    }

    #[rstest]
    #[case(250, "2.50")]
    #[case(5, "0.05")]
    #[case(1200, "12.00")]
    fn test_transaction_amount(#[case] cents: u32, #[case] expected: &str) {
        let tx = VendTransaction::new(LockerId::new(1).unwrap(), cents, 7).unwrap();
        assert_eq!(tx.amount(), expected);
    }

    #[test]
    fn test_transaction_zero_price_rejected() {
        let result = VendTransaction::new(LockerId::new(1).unwrap(), 0, 7);
        assert!(matches!(result, Err(Error::InvalidPrice(_))));
    }

    #[test]
    fn test_kiosk_defaults() {
        let settings = LockerSettings::kiosk_defaults();
        assert_eq!(settings.prices.len(), 12);
        assert_eq!(settings.colors.len(), 12);
        assert_eq!(settings.fan_mode, FanMode::Auto);
    }

    #[test]
    fn test_settings_json_roundtrip() {
        let settings = LockerSettings::kiosk_defaults();
        let json = serde_json::to_string(&settings).unwrap();
        let parsed: LockerSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, settings);
    }
}
