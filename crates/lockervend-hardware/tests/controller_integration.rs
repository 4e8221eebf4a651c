//! Integration tests for the controller runtime
//!
//! These tests run the monitor and watchdog tasks against the simulated bus
//! and check what reaches the event stream, the black box, and the wire.

use lockervend_core::constants::EVENT_CHANNEL_CAPACITY;
use lockervend_core::{BlackBoxLog, BusConfig, LockerSettings, WatchdogConfig};
use lockervend_hardware::mock::{
    SimulatedBus, SimulatedBusHandle, SimulatedInterrupt, SimulatedInterruptHandle,
};
use lockervend_hardware::{AlertKind, Controller, ControllerEvent, ControllerHandle, Transport};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Rig {
    handle: ControllerHandle<SimulatedBus>,
    bus: SimulatedBusHandle,
    line: SimulatedInterruptHandle,
    dir: TempDir,
}

fn bus_config() -> BusConfig {
    BusConfig {
        interrupt_poll_interval: Duration::from_millis(100),
        ..BusConfig::default()
    }
}

fn start() -> Rig {
    let dir = TempDir::new().unwrap();
    let (bus, bus_handle) = SimulatedBus::new();
    let (line, line_handle) = SimulatedInterrupt::new();
    let transport = Arc::new(Transport::open(Ok(bus), bus_config()));

    let handle = Controller::new(
        transport,
        WatchdogConfig::default(),
        BlackBoxLog::new(dir.path().join("BLACK_BOX_STM32.txt")),
    )
    .start(line);

    Rig {
        handle,
        bus: bus_handle,
        line: line_handle,
        dir,
    }
}

fn black_box_contents(dir: &TempDir) -> String {
    std::fs::read_to_string(dir.path().join("BLACK_BOX_STM32.txt")).unwrap_or_default()
}

#[tokio::test(start_paused = true)]
async fn test_jam_frame_reaches_event_stream() {
    let mut rig = start();

    rig.bus.queue_response([0xF1, 0x03, 150, 0, 0, 0]);
    rig.line.raise();

    assert_eq!(
        rig.handle.recv().await,
        Some(ControllerEvent::JamNotice { locker: 3 })
    );
    match rig.handle.recv().await {
        Some(ControllerEvent::Alert { kind, message }) => {
            assert_eq!(kind, AlertKind::LockerFault);
            assert!(message.contains('3'), "alert should name locker 3: {message}");
        }
        other => panic!("expected locker alert, got {other:?}"),
    }

    rig.handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_black_box_frame_is_logged() {
    let mut rig = start();

    rig.bus.queue_response([0xF6, 0x07, 0x05, 0, 0, 0]);
    rig.line.raise();
    // Frames are handled in order, so the resync marks the F6 as done.
    rig.bus.queue_response([0xF5, 0, 0, 0, 0, 0]);
    rig.line.raise();

    assert_eq!(
        rig.handle.recv().await,
        Some(ControllerEvent::ResyncRequested)
    );
    let log = black_box_contents(&rig.dir);
    assert!(log.contains("F6 07 05 00 00 00"));
    assert!(log.contains("No response received when opening the cabinet  locker: 7"));

    rig.handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_resync_pushes_settings() {
    let mut rig = start();

    rig.bus.queue_response([0xF5, 0, 0, 0, 0, 0]);
    rig.line.raise();

    let settings = LockerSettings::kiosk_defaults();
    if let Some(ControllerEvent::ResyncRequested) = rig.handle.recv().await {
        let sent = rig.handle.transport().push_settings(&settings).await;
        assert_eq!(sent, 25);
    } else {
        panic!("expected resync request");
    }

    assert_eq!(rig.bus.commands().len(), 25);
    rig.handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_garbage_frame_is_dropped() {
    let mut rig = start();

    rig.bus.queue_response([0x42, 1, 2, 3, 4, 5]);
    rig.line.raise();
    rig.bus.queue_response([0xF5, 0, 0, 0, 0, 0]);
    rig.line.raise();

    // The unknown code produced nothing; the next frame still gets through.
    assert_eq!(
        rig.handle.recv().await,
        Some(ControllerEvent::ResyncRequested)
    );
    rig.handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_watchdog_resets_then_alerts_once() {
    let mut rig = start();

    tokio::time::sleep(Duration::from_secs(130)).await;
    assert_eq!(rig.bus.reset_count(), 1);
    assert!(black_box_contents(&rig.dir).contains("Watchdog timeout"));

    match rig.handle.recv().await {
        Some(ControllerEvent::Alert { kind, message }) => {
            assert_eq!(kind, AlertKind::Watchdog);
            assert_eq!(message, "peripheral silent after reset");
        }
        other => panic!("expected watchdog alert, got {other:?}"),
    }

    // A long silence after the alert changes nothing.
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(rig.bus.reset_count(), 1);

    // Activity re-arms the watchdog for a second episode.
    rig.bus.queue_response([0xF5, 0, 0, 0, 0, 0]);
    rig.line.raise();
    assert_eq!(
        rig.handle.recv().await,
        Some(ControllerEvent::ResyncRequested)
    );

    tokio::time::sleep(Duration::from_secs(130)).await;
    assert_eq!(rig.bus.reset_count(), 2);
    assert!(matches!(
        rig.handle.recv().await,
        Some(ControllerEvent::Alert {
            kind: AlertKind::Watchdog,
            ..
        })
    ));

    rig.handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_watchdog_keeps_resetting_with_full_event_channel() {
    let mut rig = start();

    // Nobody reads events: fill the channel with resync requests.
    for _ in 0..EVENT_CHANNEL_CAPACITY {
        rig.bus.queue_response([0xF5, 0, 0, 0, 0, 0]);
        rig.line.raise();
    }
    while rig.line.pending() > 0 {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    // First episode: reset, then an alert that finds no room.
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(rig.bus.reset_count(), 1);

    // One successful exchange ends the episode.
    rig.line.raise();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(rig.line.pending(), 0);

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(rig.bus.reset_count(), 2);

    // The queued events are still intact and in order.
    for _ in 0..EVENT_CHANNEL_CAPACITY {
        assert_eq!(
            rig.handle.recv().await,
            Some(ControllerEvent::ResyncRequested)
        );
    }
    rig.handle.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_exchanges_never_interleave() {
    let (bus, bus_handle) = SimulatedBus::new();
    let config = BusConfig {
        read_phase_delay: Duration::from_millis(1),
        command_settle: Duration::from_millis(1),
        reset_pulse: Duration::from_millis(1),
        ..BusConfig::default()
    };
    let transport = Arc::new(Transport::open(Ok(bus), config));

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..9u8 {
        let transport = Arc::clone(&transport);
        tasks.spawn(async move {
            for _ in 0..10 {
                match i % 3 {
                    0 => transport.send_command(0x03, &[i + 1]).await.unwrap(),
                    1 => {
                        transport.read_response().await.unwrap();
                    }
                    _ => transport.reset_peripheral().await.unwrap(),
                }
            }
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }

    assert_eq!(bus_handle.interleavings(), 0);
    assert_eq!(bus_handle.commands().len(), 30);
    assert_eq!(bus_handle.reset_count(), 30);
}
