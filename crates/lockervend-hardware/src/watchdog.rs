//! Bus-silence watchdog.
//!
//! The watchdog escalates a silence episode in two steps: once the bus has
//! been quiet for longer than the timeout it pulses the peripheral reset
//! line, and once the same silence passes twice the timeout it raises a
//! single alert. Any successful exchange ends the episode and re-arms both
//! steps.
//!
//! The alert never waits on the event consumer: if the event channel is
//! full the alert is dropped and the watchdog keeps polling.
//!
//! ```text
//!            silence > timeout                 silence > 2 × timeout
//! Healthy ─────────────────────► ResetAttempted ─────────────────────► Alerted
//!    ▲                                  │                                 │
//!    └──────────── bus activity ────────┴─────────────────────────────────┘
//! ```
//!
//! [`Watchdog`] is the pure state machine; [`run`] is the polling task that
//! feeds it the activity clock and carries out its decisions.

use crate::clock::ActivityClock;
use crate::interpreter::{AlertKind, ControllerEvent};
use crate::traits::BusDevice;
use crate::transport::Transport;
use lockervend_core::{BlackBoxEntry, BlackBoxLog, WatchdogConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Where the current silence episode stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    Healthy,

    /// The reset pulse went out; `stale` is the activity instant the episode
    /// started from.
    ResetAttempted { stale: Instant },

    /// The alert went out. Nothing more happens until the bus recovers.
    Alerted { stale: Instant },
}

/// Action the watchdog wants carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogEvent {
    /// Pulse the reset line.
    ResetIssued { silence: Duration },

    /// Tell an operator the peripheral stayed silent after the reset.
    AlertIssued { silence: Duration },
}

/// Two-stage escalation over the activity clock.
///
/// # Examples
///
/// ```
/// use lockervend_hardware::watchdog::{Watchdog, WatchdogEvent};
/// use std::time::Duration;
/// use tokio::time::Instant;
///
/// let mut watchdog = Watchdog::new(Duration::from_secs(120));
/// let last = Instant::now();
///
/// let event = watchdog.observe(last, last + Duration::from_secs(121));
/// assert!(matches!(event, Some(WatchdogEvent::ResetIssued { .. })));
///
/// // Same episode, same poll window: nothing new.
/// assert_eq!(watchdog.observe(last, last + Duration::from_secs(126)), None);
/// ```
#[derive(Debug, Clone)]
pub struct Watchdog {
    timeout: Duration,
    state: WatchdogState,
}

impl Watchdog {
    /// Create a healthy watchdog that resets after `timeout` of silence.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            state: WatchdogState::Healthy,
        }
    }

    /// Current position in the silence episode.
    pub fn state(&self) -> WatchdogState {
        self.state
    }

    /// Silence tolerated before the reset pulse.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Advance the state machine with one poll.
    ///
    /// `last_activity` is the activity clock as read now. Returns the action
    /// to take, if any. Each episode yields at most one reset followed by at
    /// most one alert, both measured from the last activity so poll jitter
    /// does not push the alert back.
    pub fn observe(&mut self, last_activity: Instant, now: Instant) -> Option<WatchdogEvent> {
        let silence = now.saturating_duration_since(last_activity);

        match self.state {
            WatchdogState::ResetAttempted { stale } | WatchdogState::Alerted { stale }
                if last_activity > stale =>
            {
                info!("Peripheral bus active again, watchdog re-armed");
                self.state = WatchdogState::Healthy;
                None
            }
            WatchdogState::Healthy if silence > self.timeout => {
                self.state = WatchdogState::ResetAttempted {
                    stale: last_activity,
                };
                Some(WatchdogEvent::ResetIssued { silence })
            }
            WatchdogState::ResetAttempted { stale } if silence > self.timeout * 2 => {
                self.state = WatchdogState::Alerted { stale };
                Some(WatchdogEvent::AlertIssued { silence })
            }
            _ => None,
        }
    }
}

/// Poll the activity clock until cancelled, resetting and alerting as the
/// state machine decides.
///
/// The timeout entry goes to `black_box` before the reset pulse; the alert
/// goes out on `events` without waiting for room in the channel.
pub async fn run<D: BusDevice>(
    transport: Arc<Transport<D>>,
    config: WatchdogConfig,
    black_box: BlackBoxLog,
    events: mpsc::Sender<ControllerEvent>,
    cancel: CancellationToken,
) -> crate::Result<()> {
    let clock: Arc<ActivityClock> = transport.clock();
    let mut watchdog = Watchdog::new(config.timeout);
    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(
        "Watchdog started (timeout {:?}, poll {:?})",
        config.timeout, config.poll_interval
    );

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                debug!("Watchdog stopped");
                return Ok(());
            }
            _ = ticker.tick() => {}
        }

        match watchdog.observe(clock.last(), Instant::now()) {
            Some(WatchdogEvent::ResetIssued { silence }) => {
                warn!(
                    "No bus activity for {} s, resetting peripheral",
                    silence.as_secs()
                );
                black_box.append(&BlackBoxEntry::event(format!(
                    "Watchdog timeout: no bus activity for {} s, peripheral reset",
                    silence.as_secs()
                )));
                if let Err(e) = transport.reset_peripheral().await {
                    error!("Watchdog reset failed: {}", e);
                }
            }
            Some(WatchdogEvent::AlertIssued { silence }) => {
                error!(
                    "Peripheral still silent {} s after reset",
                    silence.as_secs()
                );
                let alert = ControllerEvent::Alert {
                    kind: AlertKind::Watchdog,
                    message: "peripheral silent after reset".to_string(),
                };
                match events.try_send(alert) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        warn!("Event channel full, watchdog alert dropped");
                    }
                    Err(TrySendError::Closed(_)) => {
                        debug!("Event receiver gone, watchdog alert dropped");
                    }
                }
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(120);
    const POLL: Duration = Duration::from_secs(5);

    /// Poll every five seconds for `span`, returning every event seen.
    fn poll_for(
        watchdog: &mut Watchdog,
        last: Instant,
        start: Instant,
        span: Duration,
    ) -> Vec<WatchdogEvent> {
        let mut events = Vec::new();
        let mut now = start;
        while now <= start + span {
            events.extend(watchdog.observe(last, now));
            now += POLL;
        }
        events
    }

    #[test]
    fn test_quiet_bus_within_timeout_stays_healthy() {
        let mut watchdog = Watchdog::new(TIMEOUT);
        let last = Instant::now();

        assert!(poll_for(&mut watchdog, last, last, TIMEOUT).is_empty());
        assert_eq!(watchdog.state(), WatchdogState::Healthy);
    }

    #[test]
    fn test_one_reset_then_one_alert() {
        let mut watchdog = Watchdog::new(TIMEOUT);
        let last = Instant::now();

        let events = poll_for(&mut watchdog, last, last, TIMEOUT * 5);

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], WatchdogEvent::ResetIssued { .. }));
        assert!(matches!(events[1], WatchdogEvent::AlertIssued { .. }));
        assert!(matches!(watchdog.state(), WatchdogState::Alerted { .. }));
    }

    #[test]
    fn test_alert_after_twice_the_timeout() {
        let mut watchdog = Watchdog::new(TIMEOUT);
        let last = Instant::now();

        assert!(matches!(
            watchdog.observe(last, last + TIMEOUT + POLL),
            Some(WatchdogEvent::ResetIssued { .. })
        ));
        assert_eq!(watchdog.observe(last, last + TIMEOUT * 2), None);
        assert!(matches!(
            watchdog.observe(last, last + TIMEOUT * 2 + Duration::from_millis(1)),
            Some(WatchdogEvent::AlertIssued { .. })
        ));
    }

    #[test]
    fn test_late_reset_does_not_delay_alert() {
        // Polls far apart: the reset lands well past the timeout.
        let mut watchdog = Watchdog::new(TIMEOUT);
        let last = Instant::now();

        let late_reset = last + TIMEOUT + Duration::from_secs(90);
        assert!(matches!(
            watchdog.observe(last, late_reset),
            Some(WatchdogEvent::ResetIssued { .. })
        ));
        match watchdog.observe(last, last + TIMEOUT * 2 + POLL) {
            Some(WatchdogEvent::AlertIssued { silence }) => {
                assert_eq!(silence, TIMEOUT * 2 + POLL);
            }
            other => panic!("expected alert, got {other:?}"),
        }
    }

    #[test]
    fn test_activity_after_reset_rearms() {
        let mut watchdog = Watchdog::new(TIMEOUT);
        let last = Instant::now();
        let reset_time = last + TIMEOUT + POLL;
        watchdog.observe(last, reset_time);

        let fresh = reset_time + POLL;
        assert_eq!(watchdog.observe(fresh, fresh + POLL), None);
        assert_eq!(watchdog.state(), WatchdogState::Healthy);

        let events = poll_for(&mut watchdog, fresh, fresh, TIMEOUT * 3);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_activity_after_alert_rearms() {
        let mut watchdog = Watchdog::new(TIMEOUT);
        let last = Instant::now();
        poll_for(&mut watchdog, last, last, TIMEOUT * 3);
        assert!(matches!(watchdog.state(), WatchdogState::Alerted { .. }));

        let fresh = last + TIMEOUT * 4;
        watchdog.observe(fresh, fresh);
        assert_eq!(watchdog.state(), WatchdogState::Healthy);
    }

    #[test]
    fn test_silence_equal_to_timeout_is_tolerated() {
        let mut watchdog = Watchdog::new(TIMEOUT);
        let last = Instant::now();
        assert_eq!(watchdog.observe(last, last + TIMEOUT), None);
    }
}
