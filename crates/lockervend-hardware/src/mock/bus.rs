//! Simulated SPI bus for testing and development.
//!
//! The simulated bus answers read exchanges from a scripted queue (zeros
//! when the queue is empty), can be told to fail upcoming transfers, and
//! journals every operation so tests can check exactly what reached the
//! wire and in which order.

use crate::error::{BusError, Result};
use crate::traits::BusDevice;
use crate::types::DeviceInfo;
use lockervend_core::constants::{DUMMY_BYTE, FRAME_LENGTH};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One operation observed on the simulated bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOp {
    /// An outbound command frame.
    Command([u8; FRAME_LENGTH]),
    /// Dummy write opening a read exchange.
    ReadRequest,
    /// Read phase closing a read exchange, with the bytes returned.
    ReadPhase([u8; FRAME_LENGTH]),
    ResetAsserted,
    ResetReleased,
}

#[derive(Debug, Default)]
struct SimState {
    responses: Mutex<VecDeque<[u8; FRAME_LENGTH]>>,
    journal: Mutex<Vec<BusOp>>,
    pending_failures: AtomicU32,
    interleavings: AtomicU32,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimState {
    fn record(&self, op: BusOp) {
        let mut journal = lock(&self.journal);
        // Read exchanges and reset pulses must never be split by another
        // operation.
        let split = match journal.last() {
            Some(BusOp::ReadRequest) => !matches!(op, BusOp::ReadPhase(_)),
            Some(BusOp::ResetAsserted) => op != BusOp::ResetReleased,
            _ => false,
        };
        if split {
            self.interleavings.fetch_add(1, Ordering::SeqCst);
        }
        journal.push(op);
    }

    fn take_failure(&self) -> bool {
        self.pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Simulated peripheral bus.
///
/// # Examples
///
/// ```
/// use lockervend_hardware::mock::{BusOp, SimulatedBus};
/// use lockervend_hardware::traits::BusDevice;
///
/// let (mut bus, handle) = SimulatedBus::new();
/// handle.queue_response([0xF5, 0, 0, 0, 0, 0]);
///
/// bus.write(&[0xFF; 6]).unwrap();
/// let mut reply = [0u8; 6];
/// bus.transfer(&[0u8; 6], &mut reply).unwrap();
///
/// assert_eq!(reply[0], 0xF5);
/// assert_eq!(handle.journal()[0], BusOp::ReadRequest);
/// ```
#[derive(Debug)]
pub struct SimulatedBus {
    state: Arc<SimState>,
    name: String,
}

impl SimulatedBus {
    /// Create a simulated bus and the handle that scripts it.
    pub fn new() -> (Self, SimulatedBusHandle) {
        Self::with_name("Simulated Bus")
    }

    pub fn with_name(name: impl Into<String>) -> (Self, SimulatedBusHandle) {
        let state = Arc::new(SimState::default());
        let bus = Self {
            state: Arc::clone(&state),
            name: name.into(),
        };
        (bus, SimulatedBusHandle { state })
    }
}

impl BusDevice for SimulatedBus {
    fn write(&mut self, frame: &[u8]) -> Result<()> {
        if self.state.take_failure() {
            return Err(BusError::transfer_failed("simulated write failure"));
        }

        let bytes: [u8; FRAME_LENGTH] = frame
            .try_into()
            .map_err(|_| BusError::transfer_failed(format!("{} byte write", frame.len())))?;

        if bytes == [DUMMY_BYTE; FRAME_LENGTH] {
            self.state.record(BusOp::ReadRequest);
        } else {
            self.state.record(BusOp::Command(bytes));
        }
        Ok(())
    }

    fn transfer(&mut self, _write: &[u8], read: &mut [u8]) -> Result<()> {
        if self.state.take_failure() {
            return Err(BusError::transfer_failed("simulated read failure"));
        }

        let reply = lock(&self.state.responses)
            .pop_front()
            .unwrap_or([0u8; FRAME_LENGTH]);
        let len = read.len().min(FRAME_LENGTH);
        read[..len].copy_from_slice(&reply[..len]);

        self.state.record(BusOp::ReadPhase(reply));
        Ok(())
    }

    fn set_reset(&mut self, asserted: bool) -> Result<()> {
        self.state.record(if asserted {
            BusOp::ResetAsserted
        } else {
            BusOp::ResetReleased
        });
        Ok(())
    }

    fn info(&self) -> DeviceInfo {
        DeviceInfo::new(self.name.clone(), "Mock")
    }
}

/// Handle for scripting and inspecting a [`SimulatedBus`].
///
/// Cloneable and usable from any thread while the bus itself lives inside
/// a transport.
#[derive(Debug, Clone)]
pub struct SimulatedBusHandle {
    state: Arc<SimState>,
}

impl SimulatedBusHandle {
    /// Queue the reply of the next read exchange.
    pub fn queue_response(&self, frame: [u8; FRAME_LENGTH]) {
        lock(&self.state.responses).push_back(frame);
    }

    /// Make the next `count` transfers fail.
    pub fn fail_next(&self, count: u32) {
        self.state.pending_failures.store(count, Ordering::SeqCst);
    }

    /// Snapshot of every operation so far.
    pub fn journal(&self) -> Vec<BusOp> {
        lock(&self.state.journal).clone()
    }

    /// Outbound command frames, in order.
    pub fn commands(&self) -> Vec<[u8; FRAME_LENGTH]> {
        self.journal()
            .into_iter()
            .filter_map(|op| match op {
                BusOp::Command(bytes) => Some(bytes),
                _ => None,
            })
            .collect()
    }

    /// Number of reset pulses started.
    pub fn reset_count(&self) -> usize {
        self.journal()
            .iter()
            .filter(|op| matches!(op, BusOp::ResetAsserted))
            .count()
    }

    /// Operations that landed inside an open read exchange or reset pulse.
    pub fn interleavings(&self) -> u32 {
        self.state.interleavings.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_is_journaled() {
        let (mut bus, handle) = SimulatedBus::new();
        bus.write(&[0x03, 1, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap();
        assert_eq!(handle.commands(), vec![[0x03, 1, 0xFF, 0xFF, 0xFF, 0xFF]]);
    }

    #[test]
    fn test_empty_queue_reads_zeros() {
        let (mut bus, _handle) = SimulatedBus::new();
        let mut reply = [0xAAu8; 6];
        bus.transfer(&[0u8; 6], &mut reply).unwrap();
        assert_eq!(reply, [0u8; 6]);
    }

    #[test]
    fn test_fail_next() {
        let (mut bus, handle) = SimulatedBus::new();
        handle.fail_next(2);

        assert!(bus.write(&[0x03, 1, 0xFF, 0xFF, 0xFF, 0xFF]).is_err());
        assert!(bus.transfer(&[0u8; 6], &mut [0u8; 6]).is_err());
        assert!(bus.write(&[0x03, 1, 0xFF, 0xFF, 0xFF, 0xFF]).is_ok());
        assert_eq!(handle.commands().len(), 1);
    }

    #[test]
    fn test_wrong_write_length_rejected() {
        let (mut bus, _handle) = SimulatedBus::new();
        assert!(matches!(
            bus.write(&[0x03, 1]),
            Err(BusError::TransferFailed { .. })
        ));
    }

    #[test]
    fn test_interleaving_detected() {
        let (mut bus, handle) = SimulatedBus::new();
        bus.write(&[DUMMY_BYTE; 6]).unwrap();
        bus.write(&[0x03, 1, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap();
        bus.transfer(&[0u8; 6], &mut [0u8; 6]).unwrap();

        assert_eq!(handle.interleavings(), 1);
    }

    #[test]
    fn test_transfer_during_reset_detected() {
        let (mut bus, handle) = SimulatedBus::new();
        bus.set_reset(true).unwrap();
        bus.write(&[0x03, 1, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap();
        bus.set_reset(false).unwrap();

        assert_eq!(handle.interleavings(), 1);
    }

    #[test]
    fn test_reset_count() {
        let (mut bus, handle) = SimulatedBus::new();
        bus.set_reset(true).unwrap();
        bus.set_reset(false).unwrap();
        assert_eq!(handle.reset_count(), 1);
        assert_eq!(
            handle.journal(),
            vec![BusOp::ResetAsserted, BusOp::ResetReleased]
        );
    }
}
