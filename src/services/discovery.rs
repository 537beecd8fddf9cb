//! Archive discovery: where does this application keep its resources?
//!
//! Search cascade, cheapest first:
//! 1. The selection itself is an `.asar` file
//! 2. Fixed relative paths under the app directory, then under its parent
//! 3. A depth-bounded walk of the app directory and up to two parents
//! 4. A well-known unpacked resource directory
//! 5. Loose script files anywhere under the app directory
//!
//! Working directories (any directory holding the marker file) and the
//! explicitly excluded directories are never searched, except when they
//! contain the application itself.
//!
//! Discovery only inspects the filesystem. Copying and unpacking belong to
//! [`crate::services::extraction`].

use crate::models::{ARCHIVE_EXTENSION, ApplicationSelection, DecompilerSettings, is_working_dir};
use crate::services::error::WorkflowError;
use crate::services::fs_ops::utf8_entry;
use camino::{Utf8Path, Utf8PathBuf};
use walkdir::WalkDir;

/// Well-known archive locations relative to an application directory, in priority order.
pub const FIXED_ARCHIVE_PATHS: &[&str] = &[
    "resources/app.asar",
    "resources/default_app.asar",
    "app.asar",
    "resources/app/app.asar",
    "Contents/Resources/app.asar",
    "Contents/Resources/default_app.asar",
];

/// Well-known unpacked resource directories, in priority order.
pub const UNPACKED_RESOURCE_DIRS: &[&str] = &[
    "resources",
    "Resources",
    "app",
    "resources/app",
    "Contents/Resources/app",
];

/// How many parent directories above the app directory the walk may climb.
pub const MAX_PARENT_LEVELS: usize = 2;

/// How a candidate archive was found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CandidateOrigin {
    Selected,
    FixedPath,
    Walk,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveCandidate {
    pub path: Utf8PathBuf,
    pub origin: CandidateOrigin,
}

/// What discovery found, in cascade order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Discovery {
    Archive(ArchiveCandidate),
    UnpackedResources(Utf8PathBuf),
    LooseScripts {
        root: Utf8PathBuf,
        files: Vec<Utf8PathBuf>,
    },
}

/// Join a `/`-separated relative path onto `root` component by component.
fn join_relative(root: &Utf8Path, relative: &str) -> Utf8PathBuf {
    relative
        .split('/')
        .fold(root.to_path_buf(), |path, part| path.join(part))
}

fn is_archive_file(path: &Utf8Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
        && path.is_file()
}

/// Fixed candidate paths: every entry of [`FIXED_ARCHIVE_PATHS`] under the
/// app directory, then every entry under its immediate parent.
pub fn fixed_candidates(app_dir: &Utf8Path) -> Vec<Utf8PathBuf> {
    let roots = std::iter::once(app_dir).chain(app_dir.parent());
    roots
        .flat_map(|root| {
            FIXED_ARCHIVE_PATHS
                .iter()
                .map(move |relative| join_relative(root, relative))
        })
        .collect()
}

/// Original archives that a repack may replace: the selected archive itself,
/// or every fixed candidate that currently exists.
pub fn existing_originals(selection: &ApplicationSelection) -> Vec<Utf8PathBuf> {
    if selection.is_archive() && selection.path().is_file() {
        return vec![selection.path().to_path_buf()];
    }

    let mut found: Vec<Utf8PathBuf> = Vec::new();
    for candidate in fixed_candidates(&selection.derived_app_directory()) {
        if is_archive_file(&candidate) && !found.contains(&candidate) {
            found.push(candidate);
        }
    }
    found
}

/// Searches an application's directory tree.
#[derive(Debug, Clone)]
pub struct ArchiveDiscovery<'a> {
    settings: &'a DecompilerSettings,
    excluded: Vec<Utf8PathBuf>,
}

impl<'a> ArchiveDiscovery<'a> {
    pub fn new(settings: &'a DecompilerSettings) -> Self {
        Self {
            settings,
            excluded: Vec::new(),
        }
    }

    /// Never descend into these directories (the tool's own data, logs and
    /// working directory).
    pub fn excluding<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        self.excluded.extend(dirs.into_iter().map(Into::into));
        self
    }

    /// Whether the directory `path` is skipped while searching for `app_dir`.
    fn is_excluded(&self, path: &std::path::Path, app_dir: &Utf8Path) -> bool {
        if app_dir.as_std_path().starts_with(path) {
            return false;
        }
        self.excluded
            .iter()
            .any(|excluded| path.starts_with(excluded.as_std_path()))
            || is_working_dir(path)
    }

    fn skips_entry(&self, entry: &walkdir::DirEntry, app_dir: &Utf8Path) -> bool {
        entry.file_type().is_dir() && self.is_excluded(entry.path(), app_dir)
    }

    /// Step 2: first existing fixed path.
    pub fn find_fixed(&self, app_dir: &Utf8Path) -> Option<Utf8PathBuf> {
        fixed_candidates(app_dir).into_iter().find(|candidate| {
            tracing::debug!("Checking {}", candidate);
            is_archive_file(candidate)
        })
    }

    /// Step 3: walk the app directory, then its parent, then its grandparent,
    /// each to the configured depth. A root already walked is not re-entered
    /// from the next level up.
    pub fn walk_for_archive(&self, app_dir: &Utf8Path) -> Option<Utf8PathBuf> {
        let depth = self.settings.walk_depth;
        let mut walked: Option<&Utf8Path> = None;

        for root in app_dir.ancestors().take(MAX_PARENT_LEVELS + 1) {
            tracing::debug!("Walking {} (max depth {})", root, depth);

            let entries = WalkDir::new(root)
                .max_depth(depth)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| {
                    !self.skips_entry(entry, app_dir)
                        && walked.is_none_or(|done| entry.path() != done.as_std_path())
                })
                .filter_map(Result::ok);

            for entry in entries {
                if !entry.file_type().is_file() {
                    continue;
                }
                let Some(path) = utf8_entry(entry.into_path()) else {
                    continue;
                };
                if is_archive_file(&path) {
                    return Some(path);
                }
            }

            walked = Some(root);
        }

        None
    }

    /// Step 4: first existing unpacked resource directory.
    pub fn find_unpacked(&self, app_dir: &Utf8Path) -> Option<Utf8PathBuf> {
        UNPACKED_RESOURCE_DIRS
            .iter()
            .map(|relative| join_relative(app_dir, relative))
            .find(|dir| dir.is_dir() && !self.is_excluded(dir.as_std_path(), app_dir))
    }

    /// Step 5: every script file under the app directory.
    pub fn collect_scripts(&self, app_dir: &Utf8Path) -> Vec<Utf8PathBuf> {
        WalkDir::new(app_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.skips_entry(entry, app_dir))
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| utf8_entry(entry.into_path()))
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| self.settings.is_script_extension(ext))
            })
            .collect()
    }

    /// Run the whole cascade for a selection.
    pub fn discover(&self, selection: &ApplicationSelection) -> Result<Discovery, WorkflowError> {
        tracing::info!("Searching for ASAR files...");

        if selection.is_archive() && selection.path().is_file() {
            tracing::info!("Found ASAR: {}", selection.path());
            return Ok(Discovery::Archive(ArchiveCandidate {
                path: selection.path().to_path_buf(),
                origin: CandidateOrigin::Selected,
            }));
        }

        let app_dir = selection.derived_app_directory();

        if let Some(path) = self.find_fixed(&app_dir) {
            tracing::info!("Found ASAR: {}", path);
            return Ok(Discovery::Archive(ArchiveCandidate {
                path,
                origin: CandidateOrigin::FixedPath,
            }));
        }

        tracing::info!("Searching surrounding directories for ASAR files...");
        if let Some(path) = self.walk_for_archive(&app_dir) {
            tracing::info!("Found ASAR: {}", path);
            return Ok(Discovery::Archive(ArchiveCandidate {
                path,
                origin: CandidateOrigin::Walk,
            }));
        }

        tracing::info!("No ASAR files found. Checking for unpacked resources...");
        if let Some(dir) = self.find_unpacked(&app_dir) {
            tracing::info!("Found resources directory: {}", dir);
            return Ok(Discovery::UnpackedResources(dir));
        }

        tracing::info!("No resources directory found. Collecting script files...");
        let files = self.collect_scripts(&app_dir);
        if !files.is_empty() {
            tracing::info!("Found {} script files", files.len());
            return Ok(Discovery::LooseScripts {
                root: app_dir,
                files,
            });
        }

        tracing::error!("Nothing to extract under {}", app_dir);
        Err(WorkflowError::NothingFound { searched: app_dir })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_candidates_order() {
        let candidates = fixed_candidates(Utf8Path::new("/opt/Slack"));

        assert_eq!(candidates.len(), FIXED_ARCHIVE_PATHS.len() * 2);
        assert_eq!(
            candidates[0],
            Utf8Path::new("/opt/Slack").join("resources").join("app.asar")
        );
        // Parent-level candidates come after every app-level candidate
        assert_eq!(
            candidates[FIXED_ARCHIVE_PATHS.len()],
            Utf8Path::new("/opt").join("resources").join("app.asar")
        );
    }

    #[test]
    fn test_join_relative_splits_components() {
        let joined = join_relative(Utf8Path::new("/a"), "Contents/Resources/app.asar");
        assert_eq!(joined.components().count(), 5);
        assert_eq!(joined.file_name(), Some("app.asar"));
    }
}
