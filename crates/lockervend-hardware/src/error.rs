//! Error types for bus operations.
//!
//! Bus errors are never fatal. Every caller logs them and carries on, since
//! the controller has to keep serving the kiosk even with no peripheral
//! attached.

use lockervend_protocol::ProtocolError;

/// Result type alias for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors that can occur while talking to the peripheral controller.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The bus handle failed to open at startup; the transport is a no-op.
    #[error("Bus not initialized")]
    NotInitialized,

    /// Opening the bus device failed.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },

    /// A physical transfer did not complete.
    #[error("Transfer failed: {message}")]
    TransferFailed { message: String },

    /// A GPIO line could not be read or driven.
    #[error("GPIO error on {pin}: {message}")]
    Pin { pin: String, message: String },

    /// The command could not be framed.
    #[error("Invalid command: {0}")]
    InvalidCommand(#[from] ProtocolError),
}

impl BusError {
    /// Create a new initialization failed error.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }

    /// Create a new transfer failed error.
    pub fn transfer_failed(message: impl Into<String>) -> Self {
        Self::TransferFailed {
            message: message.into(),
        }
    }

    /// Create a new GPIO error.
    pub fn pin(pin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pin {
            pin: pin.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_initialized_error() {
        let error = BusError::NotInitialized;
        assert_eq!(error.to_string(), "Bus not initialized");
    }

    #[test]
    fn test_transfer_failed_error() {
        let error = BusError::transfer_failed("spidev0.0 EIO");
        assert!(matches!(error, BusError::TransferFailed { .. }));
        assert_eq!(error.to_string(), "Transfer failed: spidev0.0 EIO");
    }

    #[test]
    fn test_pin_error() {
        let error = BusError::pin("GPIO27", "line busy");
        assert_eq!(error.to_string(), "GPIO error on GPIO27: line busy");
    }

    #[test]
    fn test_protocol_error_conversion() {
        let error: BusError = ProtocolError::PayloadTooLong { len: 6, max: 5 }.into();
        assert!(matches!(error, BusError::InvalidCommand(_)));
    }
}
