use crate::models::DecompilerSettings;
use crate::services::WorkflowError;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

/// Extension of packed Electron resource archives.
pub const ARCHIVE_EXTENSION: &str = "asar";

/// Marks a directory as one of the tool's working directories. Holds the
/// path of the last extraction output, relative to the working directory.
pub const WORKING_DIR_MARKER: &str = ".electron-decompiler";

/// Suffix appended to the working directory name when the plain name would
/// land on the application's own directory.
pub const WORKING_DIR_SUFFIX: &str = "_extracted";

/// A filesystem path chosen by the user: an application directory, an
/// executable inside one, or an archive file directly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplicationSelection {
    path: Utf8PathBuf,
}

impl ApplicationSelection {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// The directory used as search root: the path itself when it is a
    /// directory, otherwise its parent.
    pub fn derived_app_directory(&self) -> Utf8PathBuf {
        if self.path.is_dir() {
            return self.path.clone();
        }
        match self.path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
            _ => self.path.clone(),
        }
    }

    /// True when the selection names an archive file directly.
    pub fn is_archive(&self) -> bool {
        self.path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
    }

    /// Name used for the working directory.
    pub fn app_name(&self) -> String {
        let name = if self.path.is_dir() {
            self.path.file_name()
        } else {
            self.path.file_stem()
        };
        name.filter(|n| !n.is_empty())
            .unwrap_or("application")
            .to_string()
    }

    /// Working directory for this selection, adjacent to the tool's own location.
    ///
    /// Never the application directory or one of its ancestors: a tool kept
    /// next to the app folder gets `<name>_extracted` instead.
    pub fn working_directory(&self, tool_root: &Utf8Path) -> Utf8PathBuf {
        let name = self.app_name();
        let dir = tool_root.join(&name);
        if self.derived_app_directory().starts_with(&dir) {
            return tool_root.join(format!("{}{}", name, WORKING_DIR_SUFFIX));
        }
        dir
    }
}

/// Create `dir` and its marker file if they are missing.
pub fn prepare_working_dir(dir: &Utf8Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create working directory: {}", dir))?;

    let marker = dir.join(WORKING_DIR_MARKER);
    if !marker.is_file() {
        fs::write(&marker, "").with_context(|| format!("Failed to write {}", marker))?;
    }
    Ok(())
}

/// True when `dir` carries the working directory marker.
pub fn is_working_dir(dir: &std::path::Path) -> bool {
    dir.join(WORKING_DIR_MARKER).is_file()
}

/// Remember `root` as the extraction output of `working_dir` across runs.
pub fn record_extraction_root(working_dir: &Utf8Path, root: &Utf8Path) -> Result<()> {
    let relative = root
        .strip_prefix(working_dir)
        .with_context(|| format!("{} is not under {}", root, working_dir))?;
    let marker = working_dir.join(WORKING_DIR_MARKER);
    fs::write(&marker, relative.as_str()).with_context(|| format!("Failed to write {}", marker))
}

/// The extraction output recorded by [`record_extraction_root`], if any.
pub fn recorded_extraction_root(working_dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let recorded = fs::read_to_string(working_dir.join(WORKING_DIR_MARKER)).ok()?;
    let recorded = recorded.trim();
    (!recorded.is_empty()).then(|| working_dir.join(recorded))
}

/// Size and modification time of one extracted file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileFingerprint {
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl FileFingerprint {
    pub fn read(path: &Utf8Path) -> Result<Self> {
        let metadata =
            fs::metadata(path).with_context(|| format!("Failed to stat file: {}", path))?;
        Ok(Self {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

/// Where the contents of an extraction came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExtractionSource {
    /// Unpacked by the external tool from this archive.
    Archive(Utf8PathBuf),
    /// Copied from an already-unpacked resource directory.
    UnpackedResources(Utf8PathBuf),
    /// Loose script files copied from the application directory.
    LooseScripts(Utf8PathBuf),
    /// Output left in the working directory by an earlier run.
    PreviousRun(Utf8PathBuf),
}

impl std::fmt::Display for ExtractionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Archive(p) => write!(f, "archive {}", p),
            Self::UnpackedResources(p) => write!(f, "unpacked resources {}", p),
            Self::LooseScripts(p) => write!(f, "loose scripts under {}", p),
            Self::PreviousRun(p) => write!(f, "previous extraction in {}", p),
        }
    }
}

/// Files produced by one extraction, plus the fingerprints used to detect
/// user edits before a repack.
#[derive(Clone, Debug)]
pub struct ExtractionResult {
    pub source: ExtractionSource,
    pub root: Utf8PathBuf,
    pub files: Vec<Utf8PathBuf>,
    pub modified_files: BTreeSet<Utf8PathBuf>,
    fingerprints: BTreeMap<Utf8PathBuf, FileFingerprint>,
}

impl ExtractionResult {
    /// Enumerate every file under `root` (recursive) and record its fingerprint.
    pub fn capture(source: ExtractionSource, root: &Utf8Path) -> Result<Self> {
        let fingerprints = fingerprint_tree(root)?;
        let files = fingerprints.keys().cloned().collect();

        Ok(Self {
            source,
            root: root.to_path_buf(),
            files,
            modified_files: BTreeSet::new(),
            fingerprints,
        })
    }

    /// Rescan the extraction root and rebuild `modified_files`: every file
    /// that is new or whose size or modification time changed.
    pub fn refresh_modified(&mut self) -> Result<&BTreeSet<Utf8PathBuf>> {
        let current = fingerprint_tree(&self.root)?;

        self.modified_files = current
            .iter()
            .filter(|(path, print)| self.fingerprints.get(*path) != Some(*print))
            .map(|(path, _)| path.clone())
            .collect();

        Ok(&self.modified_files)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

fn fingerprint_tree(root: &Utf8Path) -> Result<BTreeMap<Utf8PathBuf, FileFingerprint>> {
    let mut prints = BTreeMap::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk directory: {}", root))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(path) = Utf8PathBuf::from_path_buf(entry.into_path()) else {
            tracing::debug!("Skipping non UTF-8 path under {}", root);
            continue;
        };
        let print = FileFingerprint::read(&path)?;
        prints.insert(path, print);
    }

    Ok(prints)
}

/// Explicit context handed to every orchestration step.
///
/// Holds what the tool knows about the current run: where npm lives, which
/// application was chosen, where its working directory is and what the last
/// extraction produced.
#[derive(Clone, Debug)]
pub struct Session {
    /// Directory the tool runs from; working directories are created here.
    pub tool_root: Utf8PathBuf,
    pub npm_path: Option<Utf8PathBuf>,
    pub selection: Option<ApplicationSelection>,
    pub working_dir: Option<Utf8PathBuf>,
    pub extraction: Option<ExtractionResult>,
    pub settings: DecompilerSettings,
    pub current_operation: String,
}

impl Session {
    pub fn new(tool_root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            tool_root: tool_root.into(),
            npm_path: None,
            selection: None,
            working_dir: None,
            extraction: None,
            settings: DecompilerSettings::default(),
            current_operation: String::new(),
        }
    }

    pub fn require_tool(&self) -> Result<&Utf8Path, WorkflowError> {
        self.npm_path.as_deref().ok_or(WorkflowError::ToolNotFound)
    }

    pub fn require_selection(&self) -> Result<&ApplicationSelection, WorkflowError> {
        self.selection
            .as_ref()
            .ok_or(WorkflowError::NoApplicationSelected)
    }

    /// The working directory, only if it exists on disk.
    pub fn require_working_dir(&self) -> Result<&Utf8Path, WorkflowError> {
        match self.working_dir.as_deref() {
            Some(dir) if dir.is_dir() => Ok(dir),
            _ => Err(WorkflowError::NoWorkingDirectory),
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.command_timeout)
    }

    /// Record a selection and create its working directory.
    ///
    /// A different selection drops the previous extraction; selecting the same
    /// path again keeps it. Nothing changes when the path does not exist.
    pub fn select_application(
        &mut self,
        selection: ApplicationSelection,
    ) -> Result<Utf8PathBuf, WorkflowError> {
        if !selection.path().exists() {
            return Err(WorkflowError::PathNotFound {
                path: selection.path().to_path_buf(),
            });
        }

        let working_dir = selection.working_directory(&self.tool_root);
        prepare_working_dir(&working_dir)?;

        if self.selection.as_ref() != Some(&selection) {
            self.extraction = None;
        }
        self.selection = Some(selection);
        self.working_dir = Some(working_dir.clone());
        Ok(working_dir)
    }
}
