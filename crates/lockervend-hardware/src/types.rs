//! Common types shared across bus device implementations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Generic device information.
///
/// Logged once when a transport opens so the black box and the journal
/// show which backend the controller was running on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device name (e.g., "spidev0.0", "Simulated Bus").
    pub name: String,

    /// Backend identifier.
    pub model: String,

    /// Optional bus clock in Hz.
    pub speed_hz: Option<u32>,
}

impl DeviceInfo {
    /// Create a new DeviceInfo with required fields.
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            speed_hz: None,
        }
    }

    /// Set the bus clock.
    pub fn with_speed_hz(mut self, speed_hz: u32) -> Self {
        self.speed_hz = Some(speed_hz);
        self
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.speed_hz {
            Some(hz) => write!(f, "{} ({}, {} Hz)", self.name, self.model, hz),
            None => write!(f, "{} ({})", self.name, self.model),
        }
    }
}
