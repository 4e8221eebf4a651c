//! Error types for payment transactions.
//!
//! Unlike bus errors these are returned to the caller: only the kiosk
//! screen knows how to tell the customer that a payment did not go through.

use crate::state::VendState;

/// Result type alias for payment operations.
pub type Result<T> = std::result::Result<T, MdbError>;

/// Why a vend transaction did not complete.
#[derive(Debug, thiserror::Error)]
pub enum MdbError {
    /// The serial link or the reader handshake failed.
    #[error("Connection error: {message}")]
    ConnectionError { message: String },

    /// The reader never reported an outcome.
    #[error("Timed out after {iterations} polls")]
    TimeoutError { iterations: u32 },

    /// The reader or the credit check refused the payment.
    #[error("Payment denied: {reason}")]
    Denied { reason: String },

    /// The reader answered with something the session cannot act on.
    #[error("Protocol error: {message}")]
    ProtocolError { message: String },

    #[error("Invalid vend state transition from {from} to {to}")]
    InvalidTransition { from: VendState, to: VendState },
}

impl MdbError {
    /// Create a new connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    /// Create a new denied error.
    pub fn denied(reason: impl Into<String>) -> Self {
        Self::Denied {
            reason: reason.into(),
        }
    }

    /// Create a new protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::ProtocolError {
            message: message.into(),
        }
    }

    /// Whether the failure belongs in the UART black box.
    pub fn is_link_failure(&self) -> bool {
        matches!(self, Self::ConnectionError { .. } | Self::TimeoutError { .. })
    }
}

impl From<std::io::Error> for MdbError {
    fn from(error: std::io::Error) -> Self {
        Self::connection(error.to_string())
    }
}

impl From<serialport::Error> for MdbError {
    fn from(error: serialport::Error) -> Self {
        Self::connection(error.to_string())
    }
}
