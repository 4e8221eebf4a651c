use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Validation errors
    #[error("Invalid locker id: {0}")]
    InvalidLockerId(u8),

    #[error("Invalid fan mask {0}: must be 0-63 or 255 for auto")]
    InvalidFanMask(u8),

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
