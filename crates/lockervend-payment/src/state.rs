//! Vend transaction state machine.
//!
//! One [`VendStateMachine`] tracks a single payment attempt against the
//! cashless reader.
//!
//! # States
//!
//! - `ReaderCheck`: confirming the reader is enabled, reinitialising once
//!   if it is not
//! - `DirectVend`: the priced request is with the reader
//! - `NormalVend`: the reader refused direct vend, waiting for credit
//! - `Confirming`: polling the reader for the outcome
//! - `Success`, `CustomerCanceled`, `Timeout`, `Error`: terminal
//!
//! # Valid Transitions
//!
//! - ReaderCheck → DirectVend
//! - DirectVend → Confirming | NormalVend | Success | CustomerCanceled
//! - NormalVend → Success | CustomerCanceled | Timeout
//! - Confirming → Success | CustomerCanceled | Timeout
//! - any non-terminal state → Error
//!
//! # Examples
//!
//! ```
//! use lockervend_payment::{VendState, VendStateMachine};
//!
//! let mut machine = VendStateMachine::new();
//! machine.transition_to(VendState::DirectVend).unwrap();
//! machine.transition_to(VendState::Confirming).unwrap();
//! machine.transition_to(VendState::Success).unwrap();
//!
//! assert!(machine.current_state().is_terminal());
//! assert!(machine.transition_to(VendState::Confirming).is_err());
//! ```

use crate::error::{MdbError, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

/// Transitions kept per machine. A full attempt takes at most four.
const MAX_HISTORY_SIZE: usize = 16;

/// Phase of a vend transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendState {
    ReaderCheck,
    DirectVend,
    NormalVend,
    Confirming,
    Success,
    CustomerCanceled,
    Timeout,
    Error,
}

impl fmt::Display for VendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VendState::ReaderCheck => "ReaderCheck",
            VendState::DirectVend => "DirectVend",
            VendState::NormalVend => "NormalVend",
            VendState::Confirming => "Confirming",
            VendState::Success => "Success",
            VendState::CustomerCanceled => "CustomerCanceled",
            VendState::Timeout => "Timeout",
            VendState::Error => "Error",
        };
        write!(f, "{}", name)
    }
}

impl VendState {
    /// Check if transition to target state is valid from this state.
    ///
    /// ```
    /// use lockervend_payment::VendState;
    ///
    /// assert!(VendState::DirectVend.can_transition_to(&VendState::NormalVend));
    /// assert!(!VendState::NormalVend.can_transition_to(&VendState::Confirming));
    /// ```
    pub fn can_transition_to(&self, target: &VendState) -> bool {
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, target),
            (_, VendState::Error)
            | (VendState::ReaderCheck, VendState::DirectVend)
            | (
                VendState::DirectVend,
                VendState::Confirming
                    | VendState::NormalVend
                    | VendState::Success
                    | VendState::CustomerCanceled
            )
            | (
                VendState::NormalVend | VendState::Confirming,
                VendState::Success | VendState::CustomerCanceled | VendState::Timeout
            )
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VendState::Success | VendState::CustomerCanceled | VendState::Timeout | VendState::Error
        )
    }
}

/// A single state transition with timestamp.
///
/// The timestamp is process-local and not serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: VendState,
    pub to: VendState,
    #[serde(skip, default = "Instant::now")]
    pub timestamp: Instant,
}

impl StateTransition {
    pub fn new(from: VendState, to: VendState) -> Self {
        Self {
            from,
            to,
            timestamp: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

/// Validated state of one vend transaction.
///
/// Not thread-safe; owned by the session running the transaction.
#[derive(Debug)]
pub struct VendStateMachine {
    current_state: VendState,
    state_entered_at: Instant,
    history: VecDeque<StateTransition>,
}

impl VendStateMachine {
    /// Create a machine in `ReaderCheck`.
    pub fn new() -> Self {
        Self {
            current_state: VendState::ReaderCheck,
            state_entered_at: Instant::now(),
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    /// State the transaction is in now.
    pub fn current_state(&self) -> &VendState {
        &self.current_state
    }

    /// Time since the last transition.
    pub fn time_in_current_state(&self) -> Duration {
        self.state_entered_at.elapsed()
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// Transition to a new state, validating the transition.
    ///
    /// # Errors
    ///
    /// Returns `MdbError::InvalidTransition` if the move is not allowed from
    /// the current state. The machine is left unchanged.
    pub fn transition_to(&mut self, new_state: VendState) -> Result<StateTransition> {
        if !self.current_state.can_transition_to(&new_state) {
            return Err(MdbError::InvalidTransition {
                from: self.current_state,
                to: new_state,
            });
        }

        Ok(self.enter(new_state))
    }

    /// Abandon the transaction in `Error`.
    ///
    /// Every non-terminal state may fail, so this cannot be rejected.
    /// Returns `None` if the transaction had already ended.
    pub fn fail(&mut self) -> Option<StateTransition> {
        if self.current_state.is_terminal() {
            return None;
        }
        Some(self.enter(VendState::Error))
    }

    fn enter(&mut self, new_state: VendState) -> StateTransition {
        let transition = StateTransition::new(self.current_state, new_state);
        self.current_state = new_state;
        self.state_entered_at = Instant::now();

        self.history.push_back(transition.clone());
        if self.history.len() > MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
        transition
    }
}

impl Default for VendStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
