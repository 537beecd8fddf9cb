//! Electron Decompiler - locate, extract and repack Electron ASAR archives
//!
//! Main entry point for the interactive console.
//!
//! # Execution Flow
//!
//! 1. Resolve the tool directory (the executable's parent); working directories go here
//! 2. Load `Electron Decompiler Data/Settings.yaml`
//! 3. Initialize logging → logs/electron-decompiler.<date>, then report whether
//!    settings came from the file or from defaults
//! 4. Build a single-threaded tokio runtime; every command runs to completion on it
//! 5. Locate npm (a missing npm is reported, not fatal)
//! 6. Take the initial application from the first command-line argument, if any
//! 7. Run the console until `quit`, then log the session summary
//!
//! Any failure during steps 1-4 is printed and the process waits for Enter
//! before exiting with a non-zero status.

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use electron_decompiler::config::{CONFIG_DIR_NAME, SettingsSource};
use electron_decompiler::logging::LOG_DIR_NAME;
use electron_decompiler::metrics::Metrics;
use electron_decompiler::services::TokioRunner;
use electron_decompiler::ui::Console;
use electron_decompiler::{APP_NAME, ConfigManager, StateManager, VERSION};
use std::io::{self, BufRead};
use std::process::ExitCode;
use std::sync::Arc;

fn tool_root() -> Result<Utf8PathBuf> {
    let exe = std::env::current_exe().context("Failed to locate the running executable")?;
    let exe = Utf8PathBuf::try_from(exe).context("Executable path is not valid UTF-8")?;
    exe.parent()
        .map(|p| p.to_path_buf())
        .context("Executable has no parent directory")
}

fn run() -> Result<()> {
    let root = tool_root()?;

    let config_manager = ConfigManager::new(root.join(CONFIG_DIR_NAME))?;
    let (user_config, source) = config_manager.load_with_source()?;

    let _log_guard = electron_decompiler::logging::setup_logging(
        &root.join(LOG_DIR_NAME),
        APP_NAME,
        user_config.settings.debug_mode,
        true,
    )?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    match source {
        SettingsSource::File => {
            tracing::info!("Loaded settings from {}", config_manager.settings_path())
        }
        SettingsSource::Defaults => tracing::warn!(
            "Settings file not found at {}, using defaults",
            config_manager.settings_path()
        ),
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build async runtime")?;

    let state = StateManager::new(root.clone());
    state.load_from_user_config(&user_config);

    let metrics = Arc::new(Metrics::new());
    let runner = TokioRunner::new(state.read(|s| s.command_timeout()))
        .with_metrics(Arc::clone(&metrics));

    let console = Console::new(state, runner, Arc::clone(&metrics), runtime);

    console.startup(std::env::args().nth(1).map(Utf8PathBuf::from));
    console.run()?;

    metrics.log_summary();
    tracing::info!("Shutdown complete");
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Startup error: {:#}", e);
            eprintln!("Press Enter to exit...");
            let mut line = String::new();
            let _ = io::stdin().lock().read_line(&mut line);
            ExitCode::FAILURE
        }
    }
}
