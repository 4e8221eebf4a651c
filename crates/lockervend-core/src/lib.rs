pub mod blackbox;
pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use blackbox::BlackBoxLog;
pub use config::{BlackBoxConfig, BusConfig, ControllerConfig, MdbConfig, WatchdogConfig};
pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
