//! Controller runtime.
//!
//! The [`Controller`] owns the background work of the peripheral link: the
//! GPIO monitor that fetches and interprets inbound frames, and the
//! watchdog that resets the peripheral when the bus goes quiet. Both send
//! their results into one event channel consumed through a
//! [`ControllerHandle`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  read_response  ┌───────────┐
//! │ Monitor  │────────────────►│           │
//! │ Task     │                 │ Transport │◄──── kiosk commands
//! └────┬─────┘  reset_periph.  │  (locked) │
//!      │     ┌────────────────►│           │
//!      │     │                 └───────────┘
//!      │ ┌───┴──────┐
//!      │ │ Watchdog │
//!      │ │ Task     │
//!      │ └───┬──────┘
//!      ▼     ▼
//! ┌─────────────────┐
//! │  Event Channel  │──────► ControllerHandle::recv
//! │  (mpsc)         │
//! └─────────────────┘
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use lockervend_core::{BlackBoxLog, BusConfig, WatchdogConfig};
//! use lockervend_hardware::manager::Controller;
//! use lockervend_hardware::mock::{SimulatedBus, SimulatedInterrupt};
//! use lockervend_hardware::transport::Transport;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> lockervend_hardware::Result<()> {
//!     let (bus, _bus_handle) = SimulatedBus::new();
//!     let (line, _line_handle) = SimulatedInterrupt::new();
//!     let transport = Arc::new(Transport::open(Ok(bus), BusConfig::default()));
//!
//!     let controller = Controller::new(
//!         transport,
//!         WatchdogConfig::default(),
//!         BlackBoxLog::new("BLACK_BOX_STM32.txt"),
//!     );
//!     let mut handle = controller.start(line);
//!
//!     while let Some(event) = handle.recv().await {
//!         println!("Event: {:?}", event);
//!     }
//!
//!     handle.shutdown().await
//! }
//! ```

use crate::Result;
use crate::interpreter::{ControllerEvent, FrameInterpreter};
use crate::traits::{BusDevice, InterruptLine};
use crate::transport::Transport;
use crate::{monitor, watchdog};
use lockervend_core::constants::EVENT_CHANNEL_CAPACITY;
use lockervend_core::{BlackBoxLog, WatchdogConfig};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Handle for receiving controller events and stopping the runtime.
pub struct ControllerHandle<D> {
    event_rx: mpsc::Receiver<ControllerEvent>,
    tasks: JoinSet<Result<()>>,
    cancel: CancellationToken,
    transport: Arc<Transport<D>>,
}

impl<D: BusDevice> ControllerHandle<D> {
    /// Receive the next event.
    ///
    /// Returns `None` once every task has stopped and the channel is closed.
    pub async fn recv(&mut self) -> Option<ControllerEvent> {
        self.event_rx.recv().await
    }

    /// The transport shared with the background tasks, for issuing commands.
    pub fn transport(&self) -> &Arc<Transport<D>> {
        &self.transport
    }

    /// Stop the background tasks and wait for them.
    ///
    /// Tasks are asked to stop through their cancellation token, so an
    /// exchange in progress completes before its task exits. Task failures
    /// are logged, not returned.
    pub async fn shutdown(mut self) -> Result<()> {
        self.cancel.cancel();

        let mut error_count = 0;
        let mut panic_count = 0;

        while let Some(result) = self.tasks.join_next().await {
            match Self::classify_task_result(result) {
                TaskTermination::Success | TaskTermination::Cancelled => {}
                TaskTermination::Error => error_count += 1,
                TaskTermination::Panic => panic_count += 1,
            }
        }

        if error_count + panic_count > 0 {
            warn!(
                "Controller stopped with {} failed and {} panicked tasks",
                error_count, panic_count
            );
        } else {
            info!("Controller stopped");
        }
        Ok(())
    }

    fn classify_task_result(
        result: std::result::Result<Result<()>, tokio::task::JoinError>,
    ) -> TaskTermination {
        match result {
            Ok(Ok(())) => TaskTermination::Success,
            Ok(Err(_)) => TaskTermination::Error,
            Err(e) if e.is_cancelled() => TaskTermination::Cancelled,
            Err(_) => TaskTermination::Panic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskTermination {
    Success,
    Error,
    Cancelled,
    Panic,
}

/// Wires the transport, monitor, and watchdog together.
pub struct Controller<D> {
    transport: Arc<Transport<D>>,
    watchdog: WatchdogConfig,
    black_box: BlackBoxLog,
    event_tx: mpsc::Sender<ControllerEvent>,
    event_rx: mpsc::Receiver<ControllerEvent>,
}

impl<D: BusDevice + 'static> Controller<D> {
    pub fn new(transport: Arc<Transport<D>>, watchdog: WatchdogConfig, black_box: BlackBoxLog) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            transport,
            watchdog,
            black_box,
            event_tx,
            event_rx,
        }
    }

    /// Spawn the background tasks and return the event handle.
    ///
    /// With a disabled transport nothing is spawned: there is no bus to
    /// read and no peripheral to reset, so the handle only ever yields
    /// `None`.
    pub fn start<I: InterruptLine + 'static>(self, interrupt: I) -> ControllerHandle<D> {
        let mut tasks = JoinSet::new();
        let cancel = CancellationToken::new();

        if self.transport.is_enabled() {
            let interpreter = FrameInterpreter::new(self.event_tx.clone(), self.black_box.clone());
            tasks.spawn(monitor::run(
                Arc::clone(&self.transport),
                interrupt,
                interpreter,
                self.transport.config().interrupt_poll_interval,
                cancel.clone(),
            ));

            tasks.spawn(watchdog::run(
                Arc::clone(&self.transport),
                self.watchdog.clone(),
                self.black_box.clone(),
                self.event_tx.clone(),
                cancel.clone(),
            ));
            debug!("Controller started with {} tasks", tasks.len());
        } else {
            warn!("Controller started without a bus, no background tasks");
        }

        // Only the tasks hold senders now, so recv() ends when they do.
        drop(self.event_tx);

        ControllerHandle {
            event_rx: self.event_rx,
            tasks,
            cancel,
            transport: self.transport,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BusError;
    use crate::mock::{SimulatedBus, SimulatedInterrupt};
    use lockervend_core::BusConfig;

    #[test]
    fn test_classify_task_result() {
        type Handle = ControllerHandle<SimulatedBus>;
        assert_eq!(Handle::classify_task_result(Ok(Ok(()))), TaskTermination::Success);
        assert_eq!(
            Handle::classify_task_result(Ok(Err(BusError::NotInitialized))),
            TaskTermination::Error
        );
    }

    #[tokio::test]
    async fn test_disabled_transport_spawns_nothing() {
        let transport: Arc<Transport<SimulatedBus>> =
            Arc::new(Transport::disabled(BusConfig::default()));
        let (line, _) = SimulatedInterrupt::new();

        let mut handle = Controller::new(
            transport,
            WatchdogConfig::default(),
            BlackBoxLog::new("unused.txt"),
        )
        .start(line);

        assert!(handle.recv().await.is_none());
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_tasks() {
        let (bus, _) = SimulatedBus::new();
        let (line, _) = SimulatedInterrupt::new();
        let transport = Arc::new(Transport::open(Ok(bus), BusConfig::default()));

        let handle = Controller::new(
            transport,
            WatchdogConfig::default(),
            BlackBoxLog::new("unused.txt"),
        )
        .start(line);

        handle.shutdown().await.unwrap();
    }
}
