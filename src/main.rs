//! gifcast
//!
//! Select a region of the desktop, record it, and share it as an animated
//! GIF. Recordings are toggled with a global hotkey.

mod capture;
mod config;
mod data;
mod encode;
mod input;
mod logging;
mod output;
mod selection;
mod session;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::{wrappers::WatchStream, StreamExt};
use tracing::{error, info, warn};

use capture::XcapDisplaySource;
use config::Config;
use input::create_input_backend;
use output::Outputs;
use selection::{OverlayManager, TracingSurfaces};
use session::{create_session_channels, SessionCommand, SessionEngine, SessionSettings, SessionState};

/// Main entry point, runs the session engine on the main thread
fn main() -> Result<()> {
    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let select_now = args.iter().any(|a| a == "--select" || a == "-s");
    let config_override = config_arg(&args)?;

    // Keep the guard alive so buffered log lines are flushed on exit
    let _log_guard = match logging::init_logging() {
        Ok(guard) => Some(guard),
        Err(e) => {
            logging::init_stderr_logging();
            warn!("File logging unavailable ({:#}), logging to stderr only", e);
            None
        }
    };

    info!("gifcast starting...");

    // Load configuration
    let config = match &config_override {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    info!("Configuration loaded from {:?}", config.config_path()?);

    // Create tokio runtime for async operations
    let runtime = Arc::new(tokio::runtime::Runtime::new()?);

    // Start global input capture (pointer taps for selection and the hotkey)
    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let mut input_backend = create_input_backend(&config.hotkey);
    let pointer_gate = input_backend.pointer_gate();
    if let Err(e) = input_backend.start(input_tx) {
        warn!(
            "Failed to start input capture: {:#}. Selection and hotkey will not respond.",
            e
        );
    }

    let overlay = OverlayManager::new(
        Box::new(TracingSurfaces::new()),
        pointer_gate,
        config.selection.min_size_points,
    );
    let outputs = Outputs::from_config(&config).context("Failed to set up output collaborators")?;
    let settings = SessionSettings::from_config(&config);

    // Create engine channels
    let (cmd_tx, cmd_rx, state_tx, state_rx) = create_session_channels();

    let mut engine = SessionEngine::new(
        settings,
        Arc::new(XcapDisplaySource::new()),
        overlay,
        outputs,
        cmd_rx,
        state_tx,
        input_rx,
    );

    // Set up Ctrl+C handler that sends shutdown command
    let ctrl_c_tx = cmd_tx.clone();
    let ctrl_c_runtime = runtime.clone();
    ctrlc::set_handler(move || {
        info!("Ctrl+C received, shutting down...");
        let tx = ctrl_c_tx.clone();
        ctrl_c_runtime.spawn(async move {
            let _ = tx.send(SessionCommand::Shutdown).await;
        });
    })?;

    // Report where each recording ends up
    runtime.spawn(async move {
        let mut states = WatchStream::new(state_rx);
        while let Some(state) = states.next().await {
            match state {
                SessionState::Completed(Some(location)) => {
                    info!("Recording saved to {}", location.display());
                }
                SessionState::Failed(reason) => warn!("Recording failed: {}", reason),
                SessionState::Selecting => info!("Drag across a display to choose a region"),
                _ => {}
            }
        }
    });

    if select_now {
        let tx = cmd_tx.clone();
        runtime.spawn(async move {
            let _ = tx.send(SessionCommand::Toggle).await;
        });
    }

    if config.hotkey.enabled {
        info!(
            "Ready. Press {:?} with {:?} to start or stop a recording, Ctrl+C to exit",
            config.hotkey.key, config.hotkey.modifiers
        );
    } else {
        info!("Ready. Hotkey disabled, Ctrl+C to exit");
    }

    runtime.block_on(async {
        if let Err(e) = engine.run().await {
            error!("Session engine error: {}", e);
        }
    });

    info!("Shutdown complete");
    Ok(())
}

/// Value of `--config <path>`, if given
fn config_arg(args: &[String]) -> Result<Option<PathBuf>> {
    let Some(index) = args.iter().position(|a| a == "--config" || a == "-c") else {
        return Ok(None);
    };
    let path = args
        .get(index + 1)
        .filter(|value| !value.starts_with('-'))
        .context("--config requires a path")?;
    Ok(Some(PathBuf::from(path)))
}

fn print_help() {
    println!("gifcast - Record a screen region as an animated GIF");
    println!();
    println!("USAGE:");
    println!("    gifcast [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help            Print this help message");
    println!("    -s, --select          Start selecting a region right away");
    println!("    -c, --config <PATH>   Use this config file instead of the default");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG              Set log level (e.g., debug, info, warn)");
    println!("    GIFCAST_LOG_PATH      Write log files to this directory");
}
