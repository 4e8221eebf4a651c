//! Inbound frame interpretation.
//!
//! Turns the six bytes fetched after an interrupt into [`ControllerEvent`]s
//! for the kiosk, or into a black-box line for 0xF6 diagnostics. Nothing in
//! here ever fails outward: malformed frames and unknown codes are logged
//! and dropped, so firmware that learns new codes keeps working with this
//! controller.

use lockervend_core::{BlackBoxEntry, BlackBoxLog, ClimateReading, hex_bytes};
use lockervend_protocol::{FrameError, InboundFrame, LockerFault, ResponseFrame};
use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// What an alert is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    LockerFault,
    I2cFault,
    ClimateFault,
    Watchdog,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LockerFault => write!(f, "Locker fault"),
            Self::I2cFault => write!(f, "I2C fault"),
            Self::ClimateFault => write!(f, "Climate fault"),
            Self::Watchdog => write!(f, "Watchdog"),
        }
    }
}

/// Everything the controller reports to the rest of the kiosk.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ControllerEvent {
    /// Text alert for the operator.
    Alert { kind: AlertKind, message: String },

    /// A customer-facing notice that a locker is jammed.
    JamNotice { locker: u8 },

    /// Temperature and humidity for the persistence layer.
    ClimateReading(ClimateReading),

    /// The peripheral restarted and needs all settings pushed again.
    ResyncRequested,
}

impl ControllerEvent {
    /// Hand the event to a callback-style consumer.
    pub fn deliver<S: NotificationSink + ?Sized>(&self, sink: &S) {
        match self {
            Self::Alert { kind, message } => sink.notify(*kind, message),
            Self::JamNotice { locker } => sink.show_jam_notice(*locker),
            Self::ClimateReading(reading) => sink.store_climate(reading),
            Self::ResyncRequested => sink.resync_requested(),
        }
    }
}

/// Consumer of controller events.
///
/// Alerts and jam notices are required; climate storage and resync handling
/// default to logging so a sink that only pages operators stays small.
pub trait NotificationSink {
    fn notify(&self, kind: AlertKind, message: &str);

    fn show_jam_notice(&self, locker: u8);

    fn store_climate(&self, reading: &ClimateReading) {
        debug!(
            "Climate sensor {}: {:.2} C, {:.2} %RH (not stored)",
            reading.sensor_id, reading.temperature, reading.humidity
        );
    }

    fn resync_requested(&self) {
        debug!("Resync requested (no handler)");
    }
}

/// Map a decoded frame to the events it produces.
///
/// Black-box frames produce none; they are persisted instead.
pub fn translate(frame: &InboundFrame) -> Vec<ControllerEvent> {
    match frame {
        InboundFrame::LockerFault { locker, fault } => {
            let alert = ControllerEvent::Alert {
                kind: AlertKind::LockerFault,
                message: fault.describe(*locker),
            };
            if *fault == LockerFault::Jammed {
                vec![ControllerEvent::JamNotice { locker: *locker }, alert]
            } else {
                vec![alert]
            }
        }
        InboundFrame::I2cFault { locker, fault } => vec![ControllerEvent::Alert {
            kind: AlertKind::I2cFault,
            message: fault.describe(*locker),
        }],
        InboundFrame::ClimateFault { object, fault } => vec![ControllerEvent::Alert {
            kind: AlertKind::ClimateFault,
            message: fault.describe(*object),
        }],
        InboundFrame::ClimateReading(reading) => {
            vec![ControllerEvent::ClimateReading(reading.clone())]
        }
        InboundFrame::ResyncRequest => vec![ControllerEvent::ResyncRequested],
        InboundFrame::BlackBox { .. } => Vec::new(),
    }
}

/// Outcome of handling one raw frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDisposition {
    /// This many events were queued.
    Dispatched(usize),

    /// A black-box line was written (or attempted).
    Logged,

    /// The frame was invalid and ignored.
    Dropped(FrameError),
}

/// Decode-and-dispatch for raw inbound frames.
#[derive(Debug, Clone)]
pub struct FrameInterpreter {
    events: mpsc::Sender<ControllerEvent>,
    black_box: BlackBoxLog,
}

impl FrameInterpreter {
    pub fn new(events: mpsc::Sender<ControllerEvent>, black_box: BlackBoxLog) -> Self {
        Self { events, black_box }
    }

    /// Interpret one frame as read off the bus.
    ///
    /// Never blocks: if the event channel is full the event is dropped with
    /// a warning rather than stalling the GPIO monitor.
    pub fn handle(&self, raw: &[u8]) -> FrameDisposition {
        let frame = match ResponseFrame::try_from(raw).and_then(|f| f.decode()) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropped inbound frame [{}]: {}", hex_bytes(raw), e);
                return FrameDisposition::Dropped(e);
            }
        };

        if let InboundFrame::BlackBox { message, .. } = &frame {
            info!("Black box: {}", message);
            self.black_box.append(&BlackBoxEntry::frame(raw, message.as_str()));
            return FrameDisposition::Logged;
        }

        let mut dispatched = 0;
        for event in translate(&frame) {
            match self.events.try_send(event) {
                Ok(()) => dispatched += 1,
                Err(mpsc::error::TrySendError::Full(event)) => {
                    warn!("Event channel full, dropped {:?}", event);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("Event receiver gone");
                }
            }
        }
        FrameDisposition::Dispatched(dispatched)
    }
}
