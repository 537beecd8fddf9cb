use crate::services::fallback::AttemptFailure;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Conditions surfaced by the orchestration steps.
///
/// None of these terminate the process: each is logged and handed back to the
/// console, which tells the user and waits for the next command.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("npm not found. Please install Node.js from https://nodejs.org/ and restart")]
    ToolNotFound,

    #[error("Please select an application first")]
    NoApplicationSelected,

    #[error("Path not found: {path}")]
    PathNotFound { path: Utf8PathBuf },

    #[error("Working directory does not exist yet. Please extract the application first")]
    NoWorkingDirectory,

    #[error("No ASAR archive, resources directory or script files found under {searched}")]
    NothingFound { searched: Utf8PathBuf },

    #[error("All {} extraction methods failed for {archive}", .attempts.len())]
    ExtractionFailed {
        archive: Utf8PathBuf,
        attempts: Vec<AttemptFailure>,
    },

    #[error("No files to recompile. Extract the application first")]
    NoFilesToRecompile,

    #[error("No original archive found and no destination was chosen")]
    DestinationNotChosen,

    #[error("All {} pack methods failed for {source_dir}", .attempts.len())]
    PackFailed {
        source_dir: Utf8PathBuf,
        attempts: Vec<AttemptFailure>,
    },

    #[error(
        "Could not replace the original archive. Replace it manually with administrator rights using {new_archive}"
    )]
    ReplaceFailed {
        new_archive: Utf8PathBuf,
        backups: Vec<Utf8PathBuf>,
        attempts: Vec<AttemptFailure>,
    },

    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

impl WorkflowError {
    /// Per-attempt diagnostics carried by fallback failures, if any.
    pub fn attempts(&self) -> &[AttemptFailure] {
        match self {
            Self::ExtractionFailed { attempts, .. }
            | Self::PackFailed { attempts, .. }
            | Self::ReplaceFailed { attempts, .. } => attempts,
            _ => &[],
        }
    }
}
