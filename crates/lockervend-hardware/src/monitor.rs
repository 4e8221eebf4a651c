//! GPIO interrupt monitor.
//!
//! Samples the interrupt line at a fixed interval. Each low-to-high
//! transition means the peripheral has a frame waiting: the monitor reads it
//! through the transport (which serialises it against outbound commands) and
//! hands it to the interpreter.

use crate::interpreter::FrameInterpreter;
use crate::traits::{BusDevice, InterruptLine};
use crate::transport::Transport;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Run the monitor until cancelled.
pub async fn run<D: BusDevice, I: InterruptLine>(
    transport: Arc<Transport<D>>,
    mut line: I,
    interpreter: FrameInterpreter,
    poll_interval: Duration,
    cancel: CancellationToken,
) -> crate::Result<()> {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut was_high = false;
    let mut pin_failing = false;

    debug!("Interrupt monitor started");

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                debug!("Interrupt monitor stopped");
                return Ok(());
            }
            _ = ticker.tick() => {}
        }

        let high = match line.is_high() {
            Ok(level) => {
                if pin_failing {
                    debug!("Interrupt line readable again");
                    pin_failing = false;
                }
                level
            }
            Err(e) => {
                // Report the first failure of a run, not every sample.
                if pin_failing {
                    debug!("Interrupt line read failed: {}", e);
                } else {
                    warn!("Interrupt line read failed: {}", e);
                    pin_failing = true;
                }
                continue;
            }
        };

        let rising = high && !was_high;
        was_high = high;
        if !rising {
            continue;
        }

        match transport.read_response().await {
            Ok(frame) => {
                interpreter.handle(&frame);
            }
            Err(e) => warn!("Failed to read frame after interrupt: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::ControllerEvent;
    use crate::mock::{SimulatedBus, SimulatedInterrupt};
    use lockervend_core::{BlackBoxLog, BusConfig};
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_edge_triggers_read_and_dispatch() {
        let dir = tempfile::TempDir::new().unwrap();
        let (bus, bus_handle) = SimulatedBus::new();
        let (line, line_handle) = SimulatedInterrupt::new();
        let transport = Arc::new(Transport::open(Ok(bus), BusConfig::default()));
        let (tx, mut rx) = mpsc::channel(8);
        let interpreter = FrameInterpreter::new(tx, BlackBoxLog::new(dir.path().join("bb.txt")));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run(
            Arc::clone(&transport),
            line,
            interpreter,
            Duration::from_millis(5),
            cancel.clone(),
        ));

        bus_handle.queue_response([0xF5, 0, 0, 0, 0, 0]);
        line_handle.raise();

        let event = rx.recv().await.unwrap();
        assert_eq!(event, ControllerEvent::ResyncRequested);

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_line_reads_nothing() {
        let (bus, bus_handle) = SimulatedBus::new();
        let (line, _line_handle) = SimulatedInterrupt::new();
        let transport = Arc::new(Transport::open(Ok(bus), BusConfig::default()));
        let (tx, _rx) = mpsc::channel(8);
        let interpreter = FrameInterpreter::new(tx, BlackBoxLog::new("unused.txt"));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run(
            transport,
            line,
            interpreter,
            Duration::from_millis(5),
            cancel.clone(),
        ));
        tokio::time::sleep(Duration::from_secs(1)).await;

        cancel.cancel();
        task.await.unwrap().unwrap();
        assert!(bus_handle.journal().is_empty());
    }
}
