//! Interactive terminal shell over the workflow.
//!
//! Commands are read from stdin one line at a time. Each command runs to
//! completion on the (single-threaded) runtime before the next prompt, so at
//! most one external process is ever in flight. Workflow progress reaches the
//! terminal through the tracing console layer; state changes are echoed by a
//! background subscriber thread.

use crate::metrics::Metrics;
use crate::models::ApplicationSelection;
use crate::services::devtools::{analyze_source_maps, install_tools, write_dev_config};
use crate::services::{
    CommandRunner, Extractor, PlatformElevation, Repacker, ToolLocator, WorkflowError,
};
use crate::state::{StateChange, StateManager};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use rfd::FileDialog;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Runtime;
use tokio::sync::broadcast::error::RecvError;

/// Files worth looking at first in an extracted Electron app.
pub const KEY_FILES: &[(&str, &str)] = &[
    ("main.js", "main process code"),
    ("renderer.js", "renderer process code"),
    ("index.html", "main window"),
    ("package.json", "application config"),
];

pub const INSTRUCTIONS: &str = "\
Electron Decompiler

Requirements:
  1. Install Node.js from https://nodejs.org/
  2. Run with administrator rights if the application is installed system-wide
  3. Run `install` before first use

Workflow:
  select [path]   Choose the Electron application folder (dialog when no path is given)
  select-file     Choose an executable or .asar file with a dialog
  install         Install the required global npm packages
  extract         Find and unpack the application's ASAR archive
                  Files go to <tool directory>/<app name>/
  sourcemaps      Run source-map-explorer on every script with a .js.map
  devtools        Write dev-config.json enabling DevTools
  edit            Open the extracted files in the file explorer
  recompile       Pack your changes and replace the original archive
                  The original is kept next to it with a .backup extension
  locate          Search for npm again
  status          Show the current selection and working directory
  help            Show this text
  quit            Exit

Troubleshooting:
  - npm not found: install Node.js, then run `locate` or restart
  - extraction fails: check the application's directory structure
  - recompile cannot replace the archive: rerun with administrator rights
  - check the log output for detailed errors
";

/// One parsed console command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Select(Option<Utf8PathBuf>),
    SelectFile,
    Install,
    Extract,
    SourceMaps,
    DevTools,
    Edit,
    Recompile,
    Locate,
    Status,
    Help,
    Quit,
}

impl Command {
    /// Parse one input line. Blank lines and unknown words give `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "select" | "browse" => {
                let path = rest.trim_matches('"');
                Self::Select((!path.is_empty()).then(|| Utf8PathBuf::from(path)))
            }
            "select-file" => Self::SelectFile,
            "install" => Self::Install,
            "extract" => Self::Extract,
            "sourcemaps" | "source-maps" => Self::SourceMaps,
            "devtools" => Self::DevTools,
            "edit" => Self::Edit,
            "recompile" | "repack" => Self::Recompile,
            "locate" => Self::Locate,
            "status" => Self::Status,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            _ => return None,
        };
        Some(command)
    }
}

fn pick_application_folder() -> Option<Utf8PathBuf> {
    FileDialog::new()
        .set_title("Select Electron application folder")
        .pick_folder()
        .and_then(to_utf8)
}

fn pick_application_file() -> Option<Utf8PathBuf> {
    FileDialog::new()
        .set_title("Select Electron application or archive")
        .add_filter("Application or archive", &["exe", "asar"])
        .add_filter("All files", &["*"])
        .pick_file()
        .and_then(to_utf8)
}

fn pick_archive_destination() -> Option<Utf8PathBuf> {
    FileDialog::new()
        .set_title("Save repacked ASAR as")
        .add_filter("ASAR archive", &["asar"])
        .set_file_name("app.asar")
        .save_file()
        .and_then(to_utf8)
}

fn to_utf8(path: std::path::PathBuf) -> Option<Utf8PathBuf> {
    Utf8PathBuf::try_from(path)
        .map_err(|e| tracing::error!("Failed to convert path to UTF-8: {}", e))
        .ok()
}

fn open_in_explorer(dir: &Utf8Path) {
    tracing::info!("Opening directory: {}", dir);
    if let Err(e) = open::that(dir.as_std_path()) {
        tracing::warn!("Could not open the file explorer: {}", e);
    }
}

/// Log a workflow error with every per-attempt diagnostic it carries.
pub fn report_error(error: &WorkflowError) {
    tracing::error!("{}", error);
    for attempt in error.attempts() {
        tracing::error!("  {}", attempt);
    }
    if let WorkflowError::ReplaceFailed {
        new_archive,
        backups,
        ..
    } = error
    {
        for backup in backups {
            tracing::info!("Backup kept at: {}", backup);
        }
        tracing::info!("New archive available at: {}", new_archive);
    }
}

/// Echo state changes on a background thread until the channel closes.
fn spawn_state_listener(state: &StateManager) -> std::thread::JoinHandle<()> {
    let mut rx = state.subscribe();

    std::thread::spawn(move || {
        tracing::debug!("State subscription thread started");
        loop {
            match rx.blocking_recv() {
                Ok(StateChange::ApplicationSelected { path, working_dir }) => {
                    tracing::info!("Selected application: {}", path);
                    tracing::info!("Working directory: {}", working_dir);
                }
                Ok(StateChange::ToolLocated { path: Some(path) }) => {
                    tracing::debug!("npm set to {}", path);
                }
                Ok(StateChange::ToolLocated { path: None }) => {
                    tracing::warn!("npm is not available; extract and recompile will refuse to run");
                }
                Ok(StateChange::ExtractionCompleted { root, file_count }) => {
                    tracing::info!("{} files ready in {}", file_count, root);
                }
                Ok(StateChange::OperationChanged { operation }) if !operation.is_empty() => {
                    tracing::debug!("Operation: {}", operation);
                }
                Ok(StateChange::RepackFinished { replaced }) => match replaced {
                    Some(path) => tracing::info!("Recompile finished: {} updated", path),
                    None => tracing::info!("Recompile finished without replacing an archive"),
                },
                Ok(_) => {}
                Err(RecvError::Closed) => {
                    tracing::debug!("State channel closed - stopping listener");
                    break;
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("State listener lagged - {} events skipped", skipped);
                }
            }
        }
    })
}

/// The interactive shell. Owns the runtime every command is driven on.
pub struct Console<R: CommandRunner> {
    state: StateManager,
    runner: R,
    metrics: Arc<Metrics>,
    runtime: Runtime,
    listener: std::thread::JoinHandle<()>,
}

impl<R: CommandRunner> Console<R> {
    /// `state` should be the only handle on the session so the listener
    /// stops when the console finishes.
    pub fn new(state: StateManager, runner: R, metrics: Arc<Metrics>, runtime: Runtime) -> Self {
        let listener = spawn_state_listener(&state);
        Self {
            state,
            runner,
            metrics,
            runtime,
            listener,
        }
    }

    /// Locate npm and apply the initial selection. Failures are reported and
    /// leave the console usable.
    pub fn startup(&self, initial: Option<Utf8PathBuf>) {
        let steps = async {
            if let Err(e) = self.locate().await {
                report_error(&e);
            }
            if let Some(path) = initial
                && let Err(e) = self.select(path)
            {
                report_error(&e);
            }
        };
        self.runtime.block_on(steps);
    }

    /// Read commands from stdin until `quit` or end of input.
    pub fn run(self) -> Result<()> {
        println!("{}", INSTRUCTIONS);

        let stdin = io::stdin();
        let mut line = String::new();
        loop {
            print!("> ");
            io::stdout().flush().context("Failed to flush stdout")?;

            line.clear();
            if stdin
                .lock()
                .read_line(&mut line)
                .context("Failed to read command")?
                == 0
            {
                break;
            }

            let Some(command) = Command::parse(&line) else {
                if !line.trim().is_empty() {
                    println!("Unknown command: {} (type `help`)", line.trim());
                }
                continue;
            };
            if command == Command::Quit {
                break;
            }

            if let Err(e) = self.runtime.block_on(self.dispatch(command)) {
                report_error(&e);
            }
        }

        // Dropping the last sender closes the channel and ends the listener
        drop(self.state);
        let _ = self.listener.join();
        Ok(())
    }

    async fn dispatch(&self, command: Command) -> Result<(), WorkflowError> {
        match command {
            Command::Select(Some(path)) => self.select(path),
            Command::Select(None) => match pick_application_folder() {
                Some(path) => self.select(path),
                None => Ok(()),
            },
            Command::SelectFile => match pick_application_file() {
                Some(path) => self.select(path),
                None => Ok(()),
            },
            Command::Install => self.install().await,
            Command::Extract => self.extract().await,
            Command::SourceMaps => self.source_maps().await,
            Command::DevTools => self.dev_tools(),
            Command::Edit => self.edit(),
            Command::Recompile => self.recompile().await,
            Command::Locate => self.locate().await,
            Command::Status => {
                self.print_status();
                Ok(())
            }
            Command::Help => {
                println!("{}", INSTRUCTIONS);
                Ok(())
            }
            Command::Quit => Ok(()),
        }
    }

    /// Select an application by path.
    pub fn select(&self, path: Utf8PathBuf) -> Result<(), WorkflowError> {
        self.state
            .select_application(ApplicationSelection::new(path))
            .map(|_| ())
    }

    pub async fn locate(&self) -> Result<(), WorkflowError> {
        let locator = self.state.read(|s| ToolLocator::from_settings(&s.settings));
        match locator.locate().await {
            Ok(path) => {
                self.state.set_npm_path(Some(path));
                Ok(())
            }
            Err(e) => {
                self.state.set_npm_path(None);
                Err(e)
            }
        }
    }

    async fn install(&self) -> Result<(), WorkflowError> {
        let session = self.state.snapshot();
        let npm = session.require_tool()?;

        self.state.set_operation("Installing tools");
        let results = install_tools(&self.runner, npm, &session.settings.global_tools).await;
        self.state.clear_operation();

        let failed = results.iter().filter(|r| !r.succeeded()).count();
        tracing::info!(
            "Tool installation finished: {} installed, {} failed",
            results.len() - failed,
            failed
        );
        Ok(())
    }

    async fn extract(&self) -> Result<(), WorkflowError> {
        let session = self.state.snapshot();
        session.require_selection()?;

        self.state.set_operation("Extracting");
        let started = Instant::now();
        let outcome = Extractor::new(&self.runner).run(&session).await;
        self.metrics.record_workflow_time(started.elapsed());
        self.state.clear_operation();

        match outcome {
            Ok(result) => {
                self.metrics.record_extraction(true);
                let root = result.root.clone();
                self.state.record_extraction(result);

                tracing::info!("Next steps:");
                tracing::info!("1. Run `edit` to modify the extracted files");
                tracing::info!("2. Run `recompile` when done");
                if session.settings.open_explorer {
                    open_in_explorer(&root);
                }
                Ok(())
            }
            Err(e) => {
                self.metrics.record_extraction(false);
                self.metrics.record_failed_attempts(e.attempts().len());
                Err(e)
            }
        }
    }

    async fn source_maps(&self) -> Result<(), WorkflowError> {
        let session = self.state.snapshot();
        let working_dir = session.require_working_dir()?;

        self.state.set_operation("Analyzing source maps");
        let report = analyze_source_maps(&self.runner, working_dir).await;
        self.state.clear_operation();

        tracing::info!(
            "Analyzed {} source maps ({} failed)",
            report.analyzed,
            report.failed.len()
        );
        Ok(())
    }

    fn dev_tools(&self) -> Result<(), WorkflowError> {
        let session = self.state.snapshot();
        let working_dir = session.require_working_dir()?;

        write_dev_config(working_dir)?;
        tracing::info!("Add these settings to your main process file to enable DevTools");
        Ok(())
    }

    fn edit(&self) -> Result<(), WorkflowError> {
        let session = self.state.snapshot();
        let working_dir = session.require_working_dir()?;
        let dir = session
            .extraction
            .as_ref()
            .map(|e| e.root.as_path())
            .filter(|root| root.is_dir())
            .unwrap_or(working_dir);

        open_in_explorer(dir);
        tracing::info!("Look for these key files:");
        for (file, role) in KEY_FILES {
            tracing::info!("- {} ({})", file, role);
        }
        tracing::info!("Editing instructions:");
        tracing::info!("1. Navigate to the file you want to modify");
        tracing::info!("2. Make your changes using any text editor");
        tracing::info!("3. Save your changes");
        tracing::info!("4. Run `recompile` when done");
        Ok(())
    }

    async fn recompile(&self) -> Result<(), WorkflowError> {
        let session = self.state.snapshot();
        tracing::info!("Preparing to recompile changes...");

        self.state.set_operation("Recompiling");
        let started = Instant::now();
        let elevation = PlatformElevation::new(&self.runner);
        let outcome = Repacker::new(&self.runner, &elevation)
            .repack(&session, pick_archive_destination)
            .await;
        self.metrics.record_workflow_time(started.elapsed());
        self.state.clear_operation();

        match outcome {
            Ok(report) => {
                self.metrics.record_repack(true);
                for backup in &report.backups {
                    tracing::info!("Original backed up to: {}", backup.backup);
                }
                self.state.finish_repack(Some(&report.replaced));
                Ok(())
            }
            Err(e) => {
                self.metrics.record_repack(false);
                self.metrics.record_failed_attempts(e.attempts().len());
                self.state.finish_repack(None);
                Err(e)
            }
        }
    }

    fn print_status(&self) {
        self.state.read(|s| {
            let npm = s.npm_path.as_ref().map_or("not found".to_string(), |p| p.to_string());
            let app = s
                .selection
                .as_ref()
                .map_or("none".to_string(), |sel| sel.path().to_string());
            let working = s
                .working_dir
                .as_ref()
                .map_or("none".to_string(), |p| p.to_string());
            let files = s.extraction.as_ref().map_or(0, |e| e.file_count());

            println!("npm:               {}", npm);
            println!("Application:       {}", app);
            println!("Working directory: {}", working);
            println!("Extracted files:   {}", files);
        });
    }
}
