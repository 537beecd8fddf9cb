//! Repack and replace: pack the extraction back into an archive, back up every
//! original archive, then swap the new archive in.
//!
//! ```text
//! Idle -> Packing -> Packed -> BackingUp -> Replacing -> Done
//!            |                                  |
//!            v                                  v
//!        PackFailed                       ReplaceFailed
//! ```
//!
//! Nothing on disk outside the working directory is touched until packing has
//! succeeded, and no original is replaced until every original has a backup.

use crate::models::{ExtractionResult, ExtractionSource, Session, recorded_extraction_root};
use crate::services::asar::{AsarCommands, AsarOperation};
use crate::services::discovery::existing_originals;
use crate::services::error::WorkflowError;
use crate::services::extraction::{
    EXTRACTED_ARCHIVE_DIR, EXTRACTED_SCRIPTS_DIR, UNPACKED_RESOURCES_DIR,
};
use crate::services::fallback::{AttemptFailure, Fallback};
use crate::services::fs_ops::{copy_file, files_identical, has_entries};
use crate::services::runner::{CommandRunner, Invocation, run_attempt};
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::fs::File;
use std::future::Future;
use std::io;
use tempfile::NamedTempFile;

/// File name of the freshly packed archive inside the working directory.
pub const REPACKED_ARCHIVE_NAME: &str = "app.asar";

/// Suffix appended to an original archive's path to name its backup.
pub const BACKUP_SUFFIX: &str = ".backup";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepackState {
    Idle,
    Packing,
    Packed,
    BackingUp,
    Replacing,
    Done,
    PackFailed,
    ReplaceFailed,
}

impl fmt::Display for RepackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Packing => "packing",
            Self::Packed => "packed",
            Self::BackingUp => "backing up",
            Self::Replacing => "replacing",
            Self::Done => "done",
            Self::PackFailed => "pack failed",
            Self::ReplaceFailed => "replace failed",
        };
        f.write_str(name)
    }
}

/// A copy of one original archive taken before any replace attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackupRecord {
    pub original: Utf8PathBuf,
    pub backup: Utf8PathBuf,
}

/// Outcome of a successful repack.
#[derive(Clone, Debug)]
pub struct RepackReport {
    /// Every state visited, starting at `Idle`.
    pub transitions: Vec<RepackState>,
    pub new_archive: Utf8PathBuf,
    /// The original archive that now holds the repacked contents.
    pub replaced: Utf8PathBuf,
    /// Label of the replacement strategy that worked.
    pub strategy: String,
    pub backups: Vec<BackupRecord>,
    /// Files changed since extraction. The whole directory is packed regardless.
    pub modified_files: Vec<Utf8PathBuf>,
}

impl RepackReport {
    pub fn state(&self) -> RepackState {
        self.transitions.last().copied().unwrap_or(RepackState::Idle)
    }
}

/// Path of the backup copy for `original`.
pub fn backup_path(original: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{}{}", original, BACKUP_SUFFIX))
}

/// Replace `target` with a copy of `source` without ever truncating `target`.
///
/// The copy is written to a temporary file beside `target` and renamed over
/// it, so a failure at any point leaves `target` as it was.
pub fn replace_atomically(source: &Utf8Path, target: &Utf8Path) -> anyhow::Result<()> {
    let parent = target
        .parent()
        .filter(|p| !p.as_str().is_empty())
        .unwrap_or(Utf8Path::new("."));

    let mut staged = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temporary file in {}", parent))?;
    let mut reader = File::open(source).with_context(|| format!("Failed to open {}", source))?;
    io::copy(&mut reader, staged.as_file_mut())
        .with_context(|| format!("Failed to stage {}", source))?;
    staged
        .as_file()
        .sync_all()
        .with_context(|| format!("Failed to flush staged copy of {}", source))?;

    staged
        .persist(target)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace {}", target))?;
    Ok(())
}

/// Out-of-process privilege escalation used by the later replacement strategies.
pub trait Elevation {
    /// Take ownership of `target` and grant the current user write access.
    fn grant_write_access(&self, target: &Utf8Path) -> impl Future<Output = Result<(), String>>;

    /// Copy `source` over `target` from an elevated process.
    fn elevated_copy(
        &self,
        source: &Utf8Path,
        target: &Utf8Path,
    ) -> impl Future<Output = Result<(), String>>;
}

/// Elevation through the platform's own tools: `takeown`/`icacls` and a
/// `RunAs` shell on Windows, `chmod` and non-interactive `sudo` elsewhere.
pub struct PlatformElevation<'r, R: CommandRunner> {
    runner: &'r R,
}

impl<'r, R: CommandRunner> PlatformElevation<'r, R> {
    pub fn new(runner: &'r R) -> Self {
        Self { runner }
    }

    #[cfg(windows)]
    fn grant_invocations(target: &Utf8Path) -> Vec<Invocation> {
        vec![
            Invocation::new("takeown").args(["/F", target.as_str()]),
            Invocation::new("icacls").args([target.as_str(), "/grant", "administrators:F"]),
        ]
    }

    #[cfg(not(windows))]
    fn grant_invocations(target: &Utf8Path) -> Vec<Invocation> {
        vec![Invocation::new("chmod").args(["u+w", target.as_str()])]
    }

    #[cfg(windows)]
    fn copy_invocation(source: &Utf8Path, target: &Utf8Path) -> Invocation {
        let copy = format!(
            "Start-Process cmd -ArgumentList '/c copy /Y \"{}\" \"{}\"' -Verb RunAs -Wait",
            powershell_quoted(source.as_str()),
            powershell_quoted(target.as_str())
        );
        Invocation::new("powershell").args(["-NoProfile", "-Command", copy.as_str()])
    }

    #[cfg(not(windows))]
    fn copy_invocation(source: &Utf8Path, target: &Utf8Path) -> Invocation {
        Invocation::new("sudo").args(["-n", "cp", "-f", source.as_str(), target.as_str()])
    }
}

impl<R: CommandRunner> Elevation for PlatformElevation<'_, R> {
    async fn grant_write_access(&self, target: &Utf8Path) -> Result<(), String> {
        for invocation in Self::grant_invocations(target) {
            run_attempt(self.runner, &invocation).await?;
        }
        Ok(())
    }

    async fn elevated_copy(&self, source: &Utf8Path, target: &Utf8Path) -> Result<(), String> {
        run_attempt(self.runner, &Self::copy_invocation(source, target))
            .await
            .map(|_| ())
    }
}

/// Escape `text` for a single-quoted PowerShell string.
pub fn powershell_quoted(text: &str) -> String {
    text.replace('\'', "''")
}

/// In-process overwrite of an original archive with the new one.
pub type DirectReplace = fn(&Utf8Path, &Utf8Path) -> anyhow::Result<()>;

/// Drives one repack through the state machine.
pub struct Repacker<'r, R: CommandRunner, E: Elevation> {
    runner: &'r R,
    elevation: &'r E,
    direct_replace: DirectReplace,
}

impl<'r, R: CommandRunner, E: Elevation> Repacker<'r, R, E> {
    pub fn new(runner: &'r R, elevation: &'r E) -> Self {
        Self {
            runner,
            elevation,
            direct_replace: replace_atomically,
        }
    }

    /// Swap the in-process overwrite, e.g. to simulate a locked file.
    pub fn with_direct_replace(mut self, direct_replace: DirectReplace) -> Self {
        self.direct_replace = direct_replace;
        self
    }

    /// The extraction to repack: the session's own, or output left in the
    /// working directory by an earlier run. The root recorded in the working
    /// directory marker wins over the fixed output names.
    fn prior_extraction(session: &Session) -> Result<ExtractionResult, WorkflowError> {
        if let Some(extraction) = &session.extraction
            && has_entries(&extraction.root)
        {
            return Ok(extraction.clone());
        }

        let working_dir = session
            .require_working_dir()
            .map_err(|_| WorkflowError::NoFilesToRecompile)?;

        let fixed = [
            EXTRACTED_ARCHIVE_DIR,
            UNPACKED_RESOURCES_DIR,
            EXTRACTED_SCRIPTS_DIR,
        ]
        .iter()
        .map(|name| working_dir.join(name));
        let leftover = recorded_extraction_root(working_dir)
            .into_iter()
            .chain(fixed)
            .find(|dir| has_entries(dir))
            .ok_or(WorkflowError::NoFilesToRecompile)?;

        tracing::info!("Using extracted files from a previous run: {}", leftover);
        let source = ExtractionSource::PreviousRun(leftover.clone());
        Ok(ExtractionResult::capture(source, &leftover)?)
    }

    fn enter(transitions: &mut Vec<RepackState>, state: RepackState) {
        tracing::info!("Repack: {}", state);
        transitions.push(state);
    }

    async fn pack(
        &self,
        npm: &Utf8Path,
        package: &str,
        source_dir: &Utf8Path,
        new_archive: &Utf8Path,
    ) -> Result<(), WorkflowError> {
        let commands = AsarCommands::new(npm, package);
        let mut chain = Fallback::new("Pack");
        for (label, invocation) in commands.variants(AsarOperation::Pack, source_dir, new_archive) {
            chain = chain.attempt(label, async move {
                run_attempt(self.runner, &invocation).await.map(|_| ())
            });
        }

        chain
            .run()
            .await
            .map(|_| ())
            .map_err(|attempts| WorkflowError::PackFailed {
                source_dir: source_dir.to_path_buf(),
                attempts,
            })
    }

    fn back_up(originals: &[Utf8PathBuf]) -> Result<Vec<BackupRecord>, WorkflowError> {
        let mut backups = Vec::with_capacity(originals.len());
        for original in originals.iter().filter(|p| p.is_file()) {
            let backup = backup_path(original);
            copy_file(original, &backup)?;
            tracing::info!("Created backup: {}", backup);
            backups.push(BackupRecord {
                original: original.clone(),
                backup,
            });
        }
        Ok(backups)
    }

    async fn replace_one(
        &self,
        new_archive: &Utf8Path,
        original: &Utf8Path,
    ) -> Result<String, Vec<AttemptFailure>> {
        let direct = self.direct_replace;
        let diag = |e: anyhow::Error| format!("{:#}", e);

        Fallback::new(format!("Replace {}", original))
            .attempt("direct overwrite", async move {
                direct(new_archive, original).map_err(diag)
            })
            .attempt("take ownership", async move {
                self.elevation.grant_write_access(original).await?;
                direct(new_archive, original).map_err(diag)
            })
            .attempt("elevated copy", async move {
                self.elevation.elevated_copy(new_archive, original).await?;
                match files_identical(new_archive, original) {
                    Ok(true) => Ok(()),
                    Ok(false) => Err("elevated copy did not update the archive".to_string()),
                    Err(e) => Err(diag(e)),
                }
            })
            .run()
            .await
            .map(|success| success.label)
    }

    /// Run the full repack.
    ///
    /// `choose_destination` is asked for a target only when no original
    /// archive can be found for the selection.
    pub async fn repack<F>(
        &self,
        session: &Session,
        choose_destination: F,
    ) -> Result<RepackReport, WorkflowError>
    where
        F: FnOnce() -> Option<Utf8PathBuf>,
    {
        let mut transitions = vec![RepackState::Idle];

        let mut extraction = Self::prior_extraction(session)?;
        let npm = session.require_tool()?;
        let selection = session.require_selection()?;
        let working_dir = session.require_working_dir()?;

        let modified_files: Vec<Utf8PathBuf> =
            extraction.refresh_modified()?.iter().cloned().collect();
        if modified_files.is_empty() {
            tracing::warn!("No modified files detected. Repacking the extracted files unchanged");
        } else {
            tracing::info!("{} modified files", modified_files.len());
        }

        let mut originals = existing_originals(selection);
        if originals.is_empty() {
            tracing::info!("Original ASAR not found. Asking for a destination");
            let destination = choose_destination().ok_or(WorkflowError::DestinationNotChosen)?;
            originals.push(destination);
        }

        let new_archive = working_dir.join(REPACKED_ARCHIVE_NAME);

        Self::enter(&mut transitions, RepackState::Packing);
        if let Err(e) = self
            .pack(npm, &session.settings.asar_package, &extraction.root, &new_archive)
            .await
        {
            Self::enter(&mut transitions, RepackState::PackFailed);
            return Err(e);
        }
        Self::enter(&mut transitions, RepackState::Packed);
        tracing::info!("Packed {} into {}", extraction.root, new_archive);

        Self::enter(&mut transitions, RepackState::BackingUp);
        let backups = Self::back_up(&originals)?;

        Self::enter(&mut transitions, RepackState::Replacing);
        let mut attempts = Vec::new();
        for original in &originals {
            match self.replace_one(&new_archive, original).await {
                Ok(strategy) => {
                    Self::enter(&mut transitions, RepackState::Done);
                    tracing::info!("Successfully replaced {} ({})", original, strategy);
                    return Ok(RepackReport {
                        transitions,
                        new_archive,
                        replaced: original.clone(),
                        strategy,
                        backups,
                        modified_files,
                    });
                }
                Err(failures) => {
                    attempts.extend(failures.into_iter().map(|f| AttemptFailure {
                        label: format!("{} ({})", f.label, original),
                        diagnostic: f.diagnostic,
                    }));
                }
            }
        }

        Self::enter(&mut transitions, RepackState::ReplaceFailed);
        tracing::error!(
            "Could not replace any original archive. New archive is at {}",
            new_archive
        );
        Err(WorkflowError::ReplaceFailed {
            new_archive,
            backups: backups.into_iter().map(|b| b.backup).collect(),
            attempts,
        })
    }
}
