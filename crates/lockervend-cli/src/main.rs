//! Kiosk runner for the locker controller.
//!
//! Runs the controller against the simulated bus by default, or against the
//! board's spidev and GPIO lines with `--hardware`. With `--vend` it sells
//! one locker through the cashless reader and exits.
//!
//! ```text
//! lockervend [config.json]
//! lockervend --hardware config.json
//! lockervend --hardware --vend 4 config.json
//! RUST_LOG=lockervend_hardware=debug lockervend
//! ```

#[cfg(target_os = "linux")]
mod board;
mod vend;

use anyhow::{Context, Result};
use clap::Parser;
use lockervend_core::{BlackBoxLog, ControllerConfig, LockerSettings};
use lockervend_hardware::mock::{SimulatedBus, SimulatedInterrupt};
use lockervend_hardware::{BusDevice, Controller, ControllerEvent, InterruptLine, Transport};
use lockervend_payment::{CancelFlag, PaymentSession, SerialLink};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lockervend", version, about = "Vending locker kiosk controller")]
struct Args {
    /// JSON configuration file; defaults apply when omitted
    config: Option<PathBuf>,

    /// Drive the board's SPI bus and GPIO lines instead of the simulator
    #[arg(long)]
    hardware: bool,

    /// Sell this locker through the cashless reader, then exit
    #[arg(long, value_name = "LOCKER")]
    vend: Option<u8>,
}

fn load_config(path: Option<&Path>) -> Result<ControllerConfig> {
    match path {
        Some(path) => ControllerConfig::from_json_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => {
            let config = ControllerConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config(args.config.as_deref())?;

    if args.hardware {
        info!("lockervend {} starting on board hardware", lockervend_core::VERSION);
        run_board(&config, args.vend).await
    } else {
        info!("lockervend {} starting in simulated mode", lockervend_core::VERSION);
        let (bus, _bus_handle) = SimulatedBus::new();
        let (interrupt, _interrupt_handle) = SimulatedInterrupt::new();
        let transport = Arc::new(Transport::open(Ok(bus), config.bus.clone()));
        serve(transport, interrupt, &config, args.vend).await
    }
}

#[cfg(target_os = "linux")]
async fn run_board(config: &ControllerConfig, vend: Option<u8>) -> Result<()> {
    match board::open(&config.bus) {
        Ok((bus, interrupt)) => {
            let transport = Arc::new(Transport::open(Ok(bus), config.bus.clone()));
            serve(transport, interrupt, config, vend).await
        }
        Err(e) => {
            // Keep the kiosk and the reader usable without the peripheral.
            let transport = Arc::new(Transport::<board::BoardBus>::open(Err(e), config.bus.clone()));
            let (idle_line, _handle) = SimulatedInterrupt::new();
            serve(transport, idle_line, config, vend).await
        }
    }
}

#[cfg(not(target_os = "linux"))]
async fn run_board(_config: &ControllerConfig, _vend: Option<u8>) -> Result<()> {
    anyhow::bail!("--hardware needs a Linux board with spidev and GPIO character devices")
}

async fn serve<D, I>(
    transport: Arc<Transport<D>>,
    interrupt: I,
    config: &ControllerConfig,
    vend: Option<u8>,
) -> Result<()>
where
    D: BusDevice + 'static,
    I: InterruptLine + 'static,
{
    if let Some(info) = transport.info() {
        info!("Bus device: {}", info);
    }

    let stm32_log = BlackBoxLog::new(&config.black_box.stm32_path);
    let mut handle = Controller::new(Arc::clone(&transport), config.watchdog.clone(), stm32_log)
        .start(interrupt);

    let settings = LockerSettings::kiosk_defaults();
    let pushed = transport.push_settings(&settings).await;
    info!("Initial settings pushed ({} commands)", pushed);

    let result = match vend {
        Some(locker) => sell_once(&transport, config, &settings, locker).await,
        None => {
            run_events(&transport, &mut handle, &settings).await;
            Ok(())
        }
    };

    transport.all_leds_off().await;
    handle.shutdown().await.context("controller shutdown failed")?;
    info!("lockervend stopped");
    result
}

async fn run_events<D: BusDevice>(
    transport: &Transport<D>,
    handle: &mut lockervend_hardware::ControllerHandle<D>,
    settings: &LockerSettings,
) {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, shutting down");
                break;
            }
            event = handle.recv() => match event {
                Some(ControllerEvent::ResyncRequested) => {
                    let pushed = transport.push_settings(settings).await;
                    info!("Resync answered ({} commands)", pushed);
                }
                Some(ControllerEvent::Alert { kind, message }) => warn!("{}: {}", kind, message),
                Some(ControllerEvent::JamNotice { locker }) => warn!("Locker {} reported jammed", locker),
                Some(ControllerEvent::ClimateReading(reading)) => info!("Climate: {:?}", reading),
                Some(other) => info!("Event: {:?}", other),
                None => {
                    error!("Controller event stream closed");
                    break;
                }
            },
        }
    }
}

async fn sell_once<D: BusDevice>(
    transport: &Transport<D>,
    config: &ControllerConfig,
    settings: &LockerSettings,
    locker: u8,
) -> Result<()> {
    let transaction = vend::transaction_for(settings, locker)?;

    let mdb = config.mdb.clone();
    let session = tokio::task::spawn_blocking(move || {
        let link = SerialLink::open(mdb.clone())?;
        let mut session = PaymentSession::new(link, mdb);
        session.initialize()?;
        Ok::<_, lockervend_payment::MdbError>(session)
    })
    .await
    .context("reader setup worker failed")?
    .context("cashless reader unavailable")?;

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling the sale");
            on_interrupt.cancel();
        }
    });

    let uart_log = BlackBoxLog::new(&config.black_box.uart_path);
    let outcome = vend::sell(transport, session, transaction, cancel, &uart_log).await;
    watcher.abort();

    outcome.map(|outcome| info!("Sale result: {:?}", outcome))
}
