//! Serialised access to the peripheral bus.
//!
//! One [`Transport`] owns the bus device behind an async mutex. Every
//! exchange (a command write, a two-phase read, a reset pulse) takes the
//! lock for its whole duration, including the deliberate delays between
//! phases, so no other exchange can land in the middle of one.
//!
//! If the bus failed to open at startup the transport runs disabled: every
//! operation is a logged no-op and the rest of the kiosk keeps working.

use crate::clock::ActivityClock;
use crate::error::{BusError, Result};
use crate::traits::BusDevice;
use crate::types::DeviceInfo;
use lockervend_core::BusConfig;
use lockervend_core::constants::{ALL_LOCKERS, DUMMY_BYTE, FRAME_LENGTH};
use lockervend_core::{FanMode, LockerId, LockerSettings, Rgb};
use lockervend_protocol::{CommandFrame, LedMode};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// Exclusive, delay-aware access to the peripheral bus.
///
/// # Examples
///
/// ```
/// use lockervend_core::{BusConfig, LockerId};
/// use lockervend_hardware::mock::SimulatedBus;
/// use lockervend_hardware::transport::Transport;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (bus, handle) = SimulatedBus::new();
/// let transport = Transport::open(Ok(bus), BusConfig::default());
///
/// transport.open_locker(LockerId::new(3).unwrap()).await;
/// assert_eq!(handle.commands(), vec![[0x03, 0x03, 0xFF, 0xFF, 0xFF, 0xFF]]);
/// # }
/// ```
pub struct Transport<D> {
    device: Option<Mutex<D>>,
    clock: Arc<ActivityClock>,
    config: BusConfig,
    info: Option<DeviceInfo>,
}

impl<D: BusDevice> Transport<D> {
    /// Wrap the outcome of opening the bus.
    ///
    /// A failed open is logged once and yields a disabled transport.
    pub fn open(device: Result<D>, config: BusConfig) -> Self {
        match device {
            Ok(device) => {
                let info = device.info();
                info!("Peripheral bus ready on {}", info);
                Self {
                    device: Some(Mutex::new(device)),
                    clock: Arc::new(ActivityClock::new()),
                    config,
                    info: Some(info),
                }
            }
            Err(e) => {
                warn!("Peripheral bus unavailable, running without it: {}", e);
                Self::disabled(config)
            }
        }
    }

    /// Transport with no bus behind it.
    pub fn disabled(config: BusConfig) -> Self {
        Self {
            device: None,
            clock: Arc::new(ActivityClock::new()),
            config,
            info: None,
        }
    }

    /// Whether a bus device is attached.
    ///
    /// Callers check this before commands whose effect they cannot verify;
    /// on a disabled transport every operation is a logged no-op.
    pub fn is_enabled(&self) -> bool {
        self.device.is_some()
    }

    /// Description of the attached device, `None` when disabled.
    pub fn info(&self) -> Option<&DeviceInfo> {
        self.info.as_ref()
    }

    /// Timing and pin settings in use.
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Shared activity clock, read by the watchdog.
    pub fn clock(&self) -> Arc<ActivityClock> {
        Arc::clone(&self.clock)
    }

    /// Instant of the last successful exchange.
    pub fn last_activity(&self) -> Instant {
        self.clock.last()
    }

    /// Frame and send one command.
    ///
    /// Payloads shorter than five bytes are padded with 0xFF.
    ///
    /// # Errors
    ///
    /// Returns `BusError::InvalidCommand` for payloads over five bytes (nothing
    /// is sent), `BusError::NotInitialized` when the transport is disabled, or
    /// `BusError::TransferFailed` when the write fails.
    pub async fn send_command(&self, command: u8, data: &[u8]) -> Result<()> {
        let frame = CommandFrame::new(command, data)?;
        self.send_frame(frame).await
    }

    /// Send an already framed command.
    ///
    /// The bus stays locked for the settle delay after the write so the
    /// peripheral has processed the command before anything else is clocked.
    ///
    /// # Errors
    ///
    /// Same as [`send_command`](Self::send_command), minus framing errors.
    pub async fn send_frame(&self, frame: CommandFrame) -> Result<()> {
        let device = self.device.as_ref().ok_or(BusError::NotInitialized)?;
        let bytes = frame.to_bytes();

        let mut bus = device.lock().await;
        bus.write(&bytes)?;
        self.clock.touch();
        trace!("Sent {}", frame);
        tokio::time::sleep(self.config.command_settle).await;
        Ok(())
    }

    /// Fetch one pending frame from the peripheral.
    ///
    /// Two phases under one lock: a dummy write of six 0xFF bytes, a short
    /// pause, then a full-duplex transfer clocking zeros out and the frame
    /// in.
    ///
    /// # Errors
    ///
    /// Returns `BusError::NotInitialized` when disabled or
    /// `BusError::TransferFailed` if either phase fails.
    pub async fn read_response(&self) -> Result<[u8; FRAME_LENGTH]> {
        let device = self.device.as_ref().ok_or(BusError::NotInitialized)?;

        let mut bus = device.lock().await;
        bus.write(&[DUMMY_BYTE; FRAME_LENGTH])?;
        tokio::time::sleep(self.config.read_phase_delay).await;

        let mut reply = [0u8; FRAME_LENGTH];
        bus.transfer(&[0u8; FRAME_LENGTH], &mut reply)?;
        self.clock.touch();
        trace!("Received {:02X?}", reply);
        Ok(reply)
    }

    /// Pulse the reset line of the peripheral.
    ///
    /// Holds the bus for the whole pulse so no frame is clocked into a
    /// peripheral that is in reset.
    ///
    /// # Errors
    ///
    /// Returns `BusError::NotInitialized` when disabled or `BusError::Pin`
    /// if the line cannot be driven.
    pub async fn reset_peripheral(&self) -> Result<()> {
        let device = self.device.as_ref().ok_or(BusError::NotInitialized)?;

        let mut bus = device.lock().await;
        warn!(
            "Resetting peripheral ({} ms pulse)",
            self.config.reset_pulse.as_millis()
        );
        bus.set_reset(true)?;
        tokio::time::sleep(self.config.reset_pulse).await;
        let released = bus.set_reset(false);
        if let Err(e) = &released {
            error!("Failed to release peripheral reset line: {}", e);
        }
        released
    }

    /// Set the LED colour of a locker, or of all lockers with id 255.
    pub async fn set_led_color(&self, locker: u8, color: Rgb, mode: LedMode) {
        self.dispatch(CommandFrame::led_color(locker, color, mode)).await;
    }

    /// Set the price shown on a locker, in cents.
    pub async fn set_price(&self, locker: LockerId, price_cents: u16) {
        self.dispatch(CommandFrame::price(locker.as_u8(), price_cents))
            .await;
    }

    /// Release the lock of a locker.
    pub async fn open_locker(&self, locker: LockerId) {
        info!("Opening locker {}", locker);
        self.dispatch(CommandFrame::open_locker(locker.as_u8())).await;
    }

    /// Set the ventilation mode: a manual fan mask or automatic control.
    pub async fn set_fan_mode(&self, mode: FanMode) {
        self.dispatch(CommandFrame::fan_mode(mode)).await;
    }

    /// Push every price, LED colour, and the fan mode.
    ///
    /// Used at startup and whenever the peripheral asks for a resync.
    /// Returns the number of commands that reached the bus.
    pub async fn push_settings(&self, settings: &LockerSettings) -> usize {
        let mut frames: Vec<CommandFrame> = settings
            .prices
            .iter()
            .map(|(locker, price)| CommandFrame::price(locker.as_u8(), *price))
            .collect();
        frames.extend(
            settings
                .colors
                .iter()
                .map(|(locker, color)| CommandFrame::led_color(locker.as_u8(), *color, LedMode::Normal)),
        );
        frames.push(CommandFrame::fan_mode(settings.fan_mode));

        let total = frames.len();
        let mut sent = 0;
        for frame in frames {
            if self.dispatch(frame).await {
                sent += 1;
            }
        }

        if sent == total {
            info!("Pushed {} settings to peripheral", sent);
        } else {
            warn!("Pushed {}/{} settings to peripheral", sent, total);
        }
        sent
    }

    /// Turn every locker LED off.
    pub async fn all_leds_off(&self) {
        self.set_led_color(ALL_LOCKERS, Rgb::new(0, 0, 0), LedMode::Off)
            .await;
    }

    /// Send a frame, logging rather than propagating failure.
    async fn dispatch(&self, frame: CommandFrame) -> bool {
        match self.send_frame(frame).await {
            Ok(()) => true,
            Err(BusError::NotInitialized) => {
                debug!("Bus disabled, dropped {}", frame);
                false
            }
            Err(e) => {
                warn!("Failed to send {}: {}", frame, e);
                false
            }
        }
    }
}

impl<D> std::fmt::Debug for Transport<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("enabled", &self.device.is_some())
            .field("info", &self.info)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
