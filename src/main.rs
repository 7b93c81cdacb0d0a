//! tapmod: Background daemon that reinterprets taps of a modifier key
//!
//! This daemon reads every physical keyboard and provides:
//! - Readiness multiplexing over all keyboard nodes (epoll)
//! - Explicit tap-vs-hold state machine for one watched modifier
//! - A uinput virtual keyboard that emits the substitute key on a tap
//!
//! Physical devices are not grabbed: the original keys still reach
//! applications, the daemon only adds the substitute key.

mod config;
mod engine;
mod events;
mod input;
mod lifecycle;
mod mux;
mod output;
mod state;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, Config};
use crate::engine::EventLoop;
use crate::input::{discover_keyboards, KeyboardSource};
use crate::lifecycle::ShutdownSignal;
use crate::mux::Multiplexer;
use crate::output::{VirtualKeyboard, VIRTUAL_DEVICE_NAME};
use crate::state::{MonotonicClock, TapHoldDisambiguator};

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_writer(std::io::stderr)
        .init();

    let result = Config::from_cli(cli).and_then(|config| {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start runtime")?
            .block_on(run(config))
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("tapmod: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(config: Config) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        "tapmod starting"
    );
    info!(
        timeout_ms = config.timeout.as_millis() as u64,
        max_devices = config.max_devices,
        modifier = config.modifier_code,
        substitute = config.substitute_code,
        "configuration loaded"
    );

    let mut shutdown = ShutdownSignal::install().context("failed to install signal handlers")?;

    // Keyboards are enumerated before the virtual keyboard exists.
    let discovery = discover_keyboards(config.max_devices, VIRTUAL_DEVICE_NAME)
        .context("failed to enumerate keyboards")?;
    let mut sources = Vec::with_capacity(discovery.accepted.len());
    for keyboard in &discovery.accepted {
        info!(path = ?keyboard.path, name = %keyboard.name, "using keyboard");
        sources.push(KeyboardSource::open(&keyboard.path).context("failed to open keyboard device")?);
    }

    let sink = VirtualKeyboard::create(VIRTUAL_DEVICE_NAME, &config.output_codes())
        .context("failed to set up the virtual keyboard")?;

    let mux = Multiplexer::new(config.max_devices).context("failed to create the multiplexer")?;
    let waker = mux.waker();

    let machine = TapHoldDisambiguator::new(config.tap_rule(), MonotonicClock);
    let mut event_loop = EventLoop::new(mux, sources, machine, sink)
        .context("failed to register keyboards")?;

    info!("daemon initialized, entering main loop");

    // The loop blocks in epoll, so it gets its own thread.
    let mut engine = tokio::task::spawn_blocking(move || event_loop.run());

    tokio::select! {
        result = &mut engine => {
            result.context("event loop panicked")?.context("event loop failed")?;
            warn!("event loop exited on its own");
        }

        _ = shutdown.wait() => {
            info!("shutdown signal received");
            waker.wake().context("failed to wake the event loop")?;
            engine
                .await
                .context("event loop panicked")?
                .context("event loop failed")?;
        }
    }

    // Keyboard handles and the virtual keyboard were dropped with the loop.
    info!("tapmod stopped");

    Ok(())
}
