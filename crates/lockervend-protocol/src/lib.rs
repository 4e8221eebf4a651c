pub mod blackbox;
pub mod command;
pub mod error;
pub mod mdb;
pub mod response;

pub use blackbox::{BlackBoxCode, black_box_message};
pub use command::{CommandCode, CommandFrame, LedMode};
pub use error::{FrameError, ProtocolError};
pub use mdb::{MdbCommand, MdbResponse, VendResult};
pub use response::{
    ClimateFault, I2cFault, InboundFrame, LockerFault, ResponseCode, ResponseFrame,
};
