//! Simulated interrupt line.

use crate::error::Result;
use crate::traits::InterruptLine;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Interrupt line driven programmatically.
///
/// Each call to [`SimulatedInterruptHandle::raise`] queues one rising edge.
/// The line reports high for exactly one sample per queued edge and low in
/// between, so a sampling monitor sees every edge exactly once.
#[derive(Debug)]
pub struct SimulatedInterrupt {
    pending: Arc<AtomicU32>,
    high: bool,
}

impl SimulatedInterrupt {
    pub fn new() -> (Self, SimulatedInterruptHandle) {
        let pending = Arc::new(AtomicU32::new(0));
        let line = Self {
            pending: Arc::clone(&pending),
            high: false,
        };
        (line, SimulatedInterruptHandle { pending })
    }
}

impl InterruptLine for SimulatedInterrupt {
    fn is_high(&mut self) -> Result<bool> {
        if self.high {
            self.high = false;
            return Ok(false);
        }

        self.high = self
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        Ok(self.high)
    }
}

/// Handle for raising a [`SimulatedInterrupt`].
#[derive(Debug, Clone)]
pub struct SimulatedInterruptHandle {
    pending: Arc<AtomicU32>,
}

impl SimulatedInterruptHandle {
    /// Queue one rising edge.
    pub fn raise(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    /// Edges not yet sampled.
    pub fn pending(&self) -> u32 {
        self.pending.load(Ordering::SeqCst)
    }
}
