#![deny(missing_docs)]
//! # UBX bridge
//! Reads UBX-NAV-PVT from a u-blox receiver on a serial port and publishes
//! rate-limited fixes, a stale-fix heartbeat and online/offline status as
//! newline-delimited JSON telemetry records.
mod bus;
mod config;
mod error;

use std::{
    fs::OpenOptions,
    process::ExitCode,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use ublox_pvt::{FixPublisher, Session, TelemetryBus};

use bus::JsonLinesBus;
use config::BridgeCfg;
use error::BridgeError;

fn main() -> ExitCode {
    env_logger::Builder::new()
        .format_target(false)
        .filter_level(log::LevelFilter::Info)
        .parse_env("LOG_LEVEL")
        .init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), BridgeError> {
    let cfg: BridgeCfg = argh::from_env();
    let cfg = if cfg.saved {
        BridgeCfg::load_default()?
    } else {
        cfg
    };
    if cfg.save {
        let path = cfg.store_default()?;
        log::info!("Stored configuration in {path:?}");
    }

    log::info!("Opening GPS on {} @ {}", cfg.device, cfg.baud_rate);
    let port = serialport::new(&cfg.device, cfg.baud_rate)
        .timeout(cfg.read_timeout())
        .open()?;

    let bus: Box<dyn TelemetryBus> = match &cfg.output {
        Some(path) => {
            log::info!("Writing telemetry to {path:?}");
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Box::new(JsonLinesBus::new(file))
        }
        None => Box::new(JsonLinesBus::new(std::io::stdout())),
    };
    let publisher = FixPublisher::new(bus, cfg.policy()?);
    let mut session = Session::new(port, cfg.assembler(), publisher, cfg.read_timeout());

    if cfg.skip_configure {
        log::info!("Leaving receiver configuration untouched");
    } else {
        // No fixes will arrive if this fails; the stale heartbeat reports it.
        match session.configure_receiver() {
            Ok(()) => log::info!("Configured receiver: NAV-PVT on USB, NMEA disabled on USB"),
            Err(e) => log::warn!("Failed to configure receiver: {e}"),
        }
    }

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            log::info!("Exiting on Ctrl+C");
            running.store(false, Ordering::SeqCst);
        })?;
    }
    session.run(&running);
    Ok(())
}
