//! One payment attempt against the cashless reader.
//!
//! A [`PaymentSession`] drives the MDB master through a single vend:
//!
//! 1. Reader check. `D,READER,1` must be answered with `d,STATUS,IDLE`. If
//!    the reader reports `INIT` or stays silent, the link is reopened and
//!    the master handshake redone once.
//! 2. Direct vend. `D,REQ,<amount>,<product>`. A `d,ERR,"-1"` answer means
//!    the reader only does normal vend: wait for the customer's credit,
//!    check it against the price, then request the vend.
//! 3. Confirmation. Poll once per interval for `RESULT,1` (finalise with
//!    `D,END`) or `RESULT,-1` (customer aborted on the reader), checking the
//!    kiosk's cancel flag before every poll.
//!
//! Every way out that leaves a request open on the reader sends
//! `D,REQ,-1` so reader and kiosk agree that nothing is pending.
//!
//! Sessions block; run them on a blocking worker thread.

use crate::error::{MdbError, Result};
use crate::link::MdbLink;
use crate::state::{VendState, VendStateMachine};
use lockervend_core::{MdbConfig, VendTransaction};
use lockervend_protocol::{MdbCommand, MdbResponse, VendResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Cooperative cancellation shared between the kiosk and a session.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create a flag that is not set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the running session to stop at its next poll.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag before reusing it for another attempt.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Who stopped a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelSource {
    /// The customer pressed cancel on the kiosk.
    Kiosk,
    /// The customer aborted on the reader.
    Reader,
}

/// How a transaction ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendOutcome {
    /// Paid; the locker may be opened.
    Vended,
    Canceled(CancelSource),
}

/// Driver for the MDB master on one link.
#[derive(Debug)]
pub struct PaymentSession<L> {
    link: L,
    config: MdbConfig,
    machine: VendStateMachine,
}

impl<L: MdbLink> PaymentSession<L> {
    /// Wrap an open link. No traffic is sent until the first call.
    pub fn new(link: L, config: MdbConfig) -> Self {
        Self {
            link,
            config,
            machine: VendStateMachine::new(),
        }
    }

    /// State of the most recent transaction.
    pub fn state(&self) -> VendState {
        *self.machine.current_state()
    }

    /// State machine of the most recent transaction, with its history.
    pub fn machine(&self) -> &VendStateMachine {
        &self.machine
    }

    /// The underlying link.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Read, poll and retry settings.
    pub fn config(&self) -> &MdbConfig {
        &self.config
    }

    /// Bring the master up in direct vend mode and enable the reader.
    ///
    /// # Errors
    ///
    /// Returns `MdbError::ConnectionError` if the reader never reports
    /// `INIT` and then `IDLE` within the configured number of reads.
    pub fn initialize(&mut self) -> Result<()> {
        let mut response = self.request(&MdbCommand::EnableMaster)?;

        if response == Some(MdbResponse::MasterAlreadyOn) {
            info!("Cashless master already on, restarting it");
            self.send(&MdbCommand::DisableMaster)?;
            self.send(&MdbCommand::EnableMaster)?;
            response = self.read()?;
        }

        self.wait_for(MdbResponse::Init, response)?;
        self.send(&MdbCommand::EnableReader)?;
        self.wait_for(MdbResponse::Idle, None)?;

        info!("Cashless reader idle and ready");
        Ok(())
    }

    /// Disable the reader and the master.
    ///
    /// # Errors
    ///
    /// Returns `MdbError::ConnectionError` if either line cannot be written.
    pub fn shutdown(&mut self) -> Result<()> {
        self.send(&MdbCommand::DisableReader)?;
        self.send(&MdbCommand::DisableMaster)?;
        info!("Cashless reader and master disabled");
        Ok(())
    }

    /// Run one vend transaction to a terminal state.
    ///
    /// # Errors
    ///
    /// - `MdbError::ConnectionError`: the link failed or the reader could
    ///   not be brought back after a reset.
    /// - `MdbError::TimeoutError`: the reader never reported an outcome.
    /// - `MdbError::Denied`: insufficient credit or a refused vend.
    /// - `MdbError::ProtocolError`: an error line the session cannot act on.
    pub fn run(&mut self, transaction: &VendTransaction, cancel: &CancelFlag) -> Result<VendOutcome> {
        self.machine = VendStateMachine::new();
        info!(
            "Vend {} started: locker {}, {}",
            transaction.id,
            transaction.locker_id,
            transaction.amount()
        );

        let result = self.execute(transaction, cancel);

        if let Some(transition) = self.machine.fail() {
            debug!("Vend {} abandoned in {}", transaction.id, transition.from);
        }
        match &result {
            Ok(outcome) => info!("Vend {} ended: {:?}", transaction.id, outcome),
            Err(e) => warn!("Vend {} failed in {}: {}", transaction.id, self.state(), e),
        }
        result
    }

    fn execute(&mut self, transaction: &VendTransaction, cancel: &CancelFlag) -> Result<VendOutcome> {
        self.check_reader()?;

        self.machine.transition_to(VendState::DirectVend)?;
        let request = MdbCommand::Request {
            amount: transaction.amount(),
            product: transaction.product_code,
        };

        match self.request(&request)? {
            Some(MdbResponse::DirectVendRejected) => {
                debug!("Direct vend rejected, falling back to normal vend");
                self.machine.transition_to(VendState::NormalVend)?;
                self.normal_vend(transaction, cancel)
            }
            Some(MdbResponse::Result(result)) => self.conclude(result),
            Some(MdbResponse::Error(line)) => Err(MdbError::protocol(line)),
            other => {
                if let Some(MdbResponse::Unknown(line)) = &other {
                    debug!("Unexpected answer to vend request: {}", line);
                }
                self.machine.transition_to(VendState::Confirming)?;
                self.confirm(cancel)
            }
        }
    }

    fn check_reader(&mut self) -> Result<()> {
        match self.request(&MdbCommand::EnableReader)? {
            Some(MdbResponse::Init) | None => {
                warn!("Cashless reader reset or silent, reinitialising");
                self.link.reopen()?;
                self.initialize()
            }
            Some(response) => {
                if response != MdbResponse::Idle {
                    debug!("Reader check answered {:?}", response);
                }
                Ok(())
            }
        }
    }

    /// Poll for the outcome of a direct vend.
    fn confirm(&mut self, cancel: &CancelFlag) -> Result<VendOutcome> {
        for iteration in 1..=self.config.confirm_iterations {
            if cancel.is_cancelled() {
                info!("Vend cancelled from the kiosk");
                self.cancel_on_reader()?;
                self.machine.transition_to(VendState::CustomerCanceled)?;
                return Ok(VendOutcome::Canceled(CancelSource::Kiosk));
            }

            match self.read()? {
                Some(MdbResponse::Result(result)) => return self.conclude(result),
                Some(MdbResponse::Error(line)) => {
                    self.cancel_on_reader()?;
                    return Err(MdbError::denied(line));
                }
                response => debug!("Confirmation poll {}: {:?}", iteration, response),
            }

            std::thread::sleep(self.config.confirm_interval);
        }

        self.cancel_on_reader()?;
        self.machine.transition_to(VendState::Timeout)?;
        Err(MdbError::TimeoutError {
            iterations: self.config.confirm_iterations,
        })
    }

    /// Wait for credit, check it, and request the vend.
    fn normal_vend(&mut self, transaction: &VendTransaction, cancel: &CancelFlag) -> Result<VendOutcome> {
        info!("Waiting for payment media");
        let mut credit = None;

        for _ in 0..self.config.credit_wait_iterations {
            if cancel.is_cancelled() {
                self.cancel_on_reader()?;
                self.machine.transition_to(VendState::CustomerCanceled)?;
                return Ok(VendOutcome::Canceled(CancelSource::Kiosk));
            }
            match self.read()? {
                Some(MdbResponse::Credit(cents)) => {
                    credit = Some(cents);
                    break;
                }
                Some(MdbResponse::Result(VendResult::CustomerCanceled)) => {
                    self.cancel_on_reader()?;
                    self.machine.transition_to(VendState::CustomerCanceled)?;
                    return Ok(VendOutcome::Canceled(CancelSource::Reader));
                }
                _ => {}
            }
        }

        let Some(credit) = credit else {
            self.cancel_on_reader()?;
            self.machine.transition_to(VendState::Timeout)?;
            return Err(MdbError::TimeoutError {
                iterations: self.config.credit_wait_iterations,
            });
        };

        if credit < transaction.price {
            self.cancel_on_reader()?;
            return Err(MdbError::denied(format!(
                "credit {}.{:02} below price {}",
                credit / 100,
                credit % 100,
                transaction.amount()
            )));
        }

        let request = MdbCommand::Request {
            amount: transaction.amount(),
            product: transaction.product_code,
        };
        match self.request(&request)? {
            Some(MdbResponse::Vend) => {
                self.request(&MdbCommand::End)?;
                self.machine.transition_to(VendState::Success)?;
                Ok(VendOutcome::Vended)
            }
            other => {
                self.cancel_on_reader()?;
                Err(MdbError::denied(format!("vend not approved: {other:?}")))
            }
        }
    }

    /// Act on a `RESULT` line.
    fn conclude(&mut self, result: VendResult) -> Result<VendOutcome> {
        match result {
            VendResult::Success => {
                self.request(&MdbCommand::End)?;
                self.machine.transition_to(VendState::Success)?;
                Ok(VendOutcome::Vended)
            }
            VendResult::CustomerCanceled => {
                info!("Vend cancelled on the reader");
                self.cancel_on_reader()?;
                self.machine.transition_to(VendState::CustomerCanceled)?;
                Ok(VendOutcome::Canceled(CancelSource::Reader))
            }
        }
    }

    fn cancel_on_reader(&mut self) -> Result<()> {
        let ack = self.request(&MdbCommand::CancelRequest)?;
        debug!("Reader cancel acknowledged with {:?}", ack);
        Ok(())
    }

    /// Read until `expected` arrives, starting from an already read line.
    fn wait_for(&mut self, expected: MdbResponse, mut response: Option<MdbResponse>) -> Result<()> {
        let mut reads = 0;
        while response.as_ref() != Some(&expected) {
            if reads >= self.config.init_wait_lines {
                return Err(MdbError::connection(format!(
                    "reader did not report {expected:?} after {reads} reads"
                )));
            }
            debug!("Waiting for {:?}", expected);
            response = self.read()?;
            reads += 1;
        }
        Ok(())
    }

    fn send(&mut self, command: &MdbCommand) -> Result<()> {
        self.link.write_line(&command.to_string())
    }

    fn read(&mut self) -> Result<Option<MdbResponse>> {
        Ok(self.link.read_line()?.map(|line| MdbResponse::parse(&line)))
    }

    fn request(&mut self, command: &MdbCommand) -> Result<Option<MdbResponse>> {
        self.send(command)?;
        self.read()
    }
}
