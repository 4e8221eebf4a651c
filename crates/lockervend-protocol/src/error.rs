use thiserror::Error;

/// Errors raised while building outbound frames.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Payload does not fit the fixed frame layout.
    #[error("Payload too long: {len} bytes, at most {max} allowed")]
    PayloadTooLong { len: usize, max: usize },

    /// Command byte outside the outbound command set.
    #[error("Unknown outbound command: 0x{0:02X}")]
    UnknownCommand(u8),
}

/// Reasons an inbound frame is dropped.
///
/// Neither is fatal: the frame is logged and discarded.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum FrameError {
    /// Frame is not exactly six bytes.
    #[error("Wrong frame length: expected 6 bytes, got {len}")]
    WrongLength { len: usize },

    /// Command byte the interpreter does not know.
    #[error("Unknown response command: 0x{0:02X}")]
    UnknownCommand(u8),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
