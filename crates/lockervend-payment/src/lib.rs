//! Cashless payment for the locker vending kiosk.
//!
//! The kiosk takes card and phone payments through an MDB cashless reader
//! behind a USB serial MDB master. This crate drives that reader for one
//! purchase at a time:
//!
//! - [`link`]: the [`MdbLink`] line transport and its serial implementation.
//! - [`mock`]: a scripted link for tests and bench runs.
//! - [`state`]: the validated [`VendStateMachine`].
//! - [`session`]: the [`PaymentSession`] handshake, vend and confirmation
//!   logic.
//! - [`checkout`]: the async [`purchase`] workflow that opens the locker
//!   once the reader confirms payment.
//!
//! # Examples
//!
//! ```
//! use lockervend_core::{LockerId, MdbConfig, VendTransaction};
//! use lockervend_payment::mock::ScriptedLink;
//! use lockervend_payment::{CancelFlag, PaymentSession, VendOutcome};
//! use std::time::Duration;
//!
//! let (link, reader) = ScriptedLink::new();
//! reader.push_script(&[Some("d,STATUS,IDLE"), Some("d,STATUS,VEND"), Some("d,STATUS,RESULT,1")]);
//!
//! let config = MdbConfig { confirm_interval: Duration::ZERO, ..MdbConfig::default() };
//! let mut session = PaymentSession::new(link, config);
//! let tx = VendTransaction::new(LockerId::new(2).unwrap(), 250, 2).unwrap();
//!
//! assert_eq!(session.run(&tx, &CancelFlag::new()).unwrap(), VendOutcome::Vended);
//! assert_eq!(reader.written(), vec!["D,READER,1", "D,REQ,2.50,2", "D,END"]);
//! ```

pub mod checkout;
pub mod error;
pub mod link;
pub mod mock;
pub mod session;
pub mod state;

// Re-export commonly used types for convenience
pub use checkout::purchase;
pub use error::{MdbError, Result};
pub use link::{MdbLink, SerialLink};
pub use session::{CancelFlag, CancelSource, PaymentSession, VendOutcome};
pub use state::{StateTransition, VendState, VendStateMachine};
