//! ASCII line vocabulary of the MDB cashless master interface.
//!
//! The controller talks to the payment reader through a USB/serial MDB
//! master that accepts newline-terminated commands starting with `D,` and
//! answers with lines starting with `d,` (or `D,ERR` for master errors).
//!
//! ```text
//! host -> D,2                      start master in direct vend mode
//! host <- d,STATUS,INIT
//! host -> D,READER,1               enable reader
//! host <- d,STATUS,IDLE
//! host -> D,REQ,2.50,7             request 2.50 for product 7
//! host <- d,STATUS,VEND
//! host <- d,STATUS,RESULT,1        customer paid
//! host -> D,END
//! ```

use std::fmt;

/// Command sent to the MDB master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MdbCommand {
    /// `D,2`: start the cashless master in direct vend mode.
    EnableMaster,
    /// `D,0`
    DisableMaster,
    /// `D,READER,1`
    EnableReader,
    /// `D,READER,0`
    DisableReader,
    /// `D,REQ,<amount>,<product>`; amount in currency units.
    Request { amount: String, product: u16 },
    /// `D,REQ,-1`: abort the pending request.
    CancelRequest,
    /// `D,END`: close a completed vend.
    End,
}

impl fmt::Display for MdbCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnableMaster => write!(f, "D,2"),
            Self::DisableMaster => write!(f, "D,0"),
            Self::EnableReader => write!(f, "D,READER,1"),
            Self::DisableReader => write!(f, "D,READER,0"),
            Self::Request { amount, product } => write!(f, "D,REQ,{amount},{product}"),
            Self::CancelRequest => write!(f, "D,REQ,-1"),
            Self::End => write!(f, "D,END"),
        }
    }
}

/// Outcome code carried by `d,STATUS,RESULT,<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendResult {
    /// `1`
    Success,
    /// `-1`: the customer aborted on the reader.
    CustomerCanceled,
}

/// Line received from the MDB master.
#[derive(Debug, Clone, PartialEq)]
pub enum MdbResponse {
    /// `d,STATUS,INIT`: the reader has (re)started and needs enabling.
    Init,
    /// `d,STATUS,IDLE`
    Idle,
    /// `d,STATUS,VEND`: a vend session is open.
    Vend,
    Result(VendResult),
    /// `d,STATUS,CREDIT,<amount>`, converted to cents.
    Credit(u32),
    /// `D,ERR,"cashless master is on"`
    MasterAlreadyOn,
    /// `d,ERR,"-1"`: the reader does not accept direct vend.
    DirectVendRejected,
    /// Any other error line.
    Error(String),
    /// Anything this vocabulary does not cover.
    Unknown(String),
}

impl MdbResponse {
    /// Classify a raw line. Never fails; unrecognised input is `Unknown`.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();

        if let Some(status) = line.strip_prefix("d,STATUS,") {
            return Self::parse_status(status, line);
        }

        if line.contains(r#"ERR,"cashless master is on""#) {
            return Self::MasterAlreadyOn;
        }
        if line == r#"d,ERR,"-1""# {
            return Self::DirectVendRejected;
        }
        if line.starts_with("d,ERR") || line.starts_with("D,ERR") {
            return Self::Error(line.to_string());
        }

        Self::Unknown(line.to_string())
    }

    fn parse_status(status: &str, line: &str) -> Self {
        let mut parts = status.split(',');
        match (parts.next(), parts.next()) {
            (Some("INIT"), _) => Self::Init,
            (Some("IDLE"), _) => Self::Idle,
            (Some("VEND"), _) => Self::Vend,
            (Some("RESULT"), Some("1")) => Self::Result(VendResult::Success),
            (Some("RESULT"), Some("-1")) => Self::Result(VendResult::CustomerCanceled),
            (Some("CREDIT"), Some(amount)) => match parse_cents(amount) {
                Some(cents) => Self::Credit(cents),
                None => Self::Unknown(line.to_string()),
            },
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// Parse a currency amount such as `2.5` or `12.00` into cents.
fn parse_cents(amount: &str) -> Option<u32> {
    let value: f64 = amount.trim().parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some((value * 100.0).round() as u32)
}
