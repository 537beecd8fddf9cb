//! Extraction: turn whatever discovery found into files inside the working directory.

use crate::config::CONFIG_DIR_NAME;
use crate::logging::LOG_DIR_NAME;
use crate::models::{
    ExtractionResult, ExtractionSource, Session, prepare_working_dir, record_extraction_root,
};
use crate::services::asar::{AsarCommands, AsarOperation};
use crate::services::discovery::{ArchiveDiscovery, CandidateOrigin, Discovery};
use crate::services::error::WorkflowError;
use crate::services::fallback::Fallback;
use crate::services::fs_ops::{copy_file, copy_tree, reset_dir};
use crate::services::runner::{CommandRunner, run_attempt};
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Output directory for an unpacked archive found at a fixed location.
pub const EXTRACTED_ARCHIVE_DIR: &str = "extracted_asar";
/// Output directory for a copied unpacked resource tree.
pub const UNPACKED_RESOURCES_DIR: &str = "unpacked_resources";
/// Output directory for loose script files.
pub const EXTRACTED_SCRIPTS_DIR: &str = "extracted_scripts";

/// Runs discovery, then extracts or copies into the session's working directory.
pub struct Extractor<'r, R: CommandRunner> {
    runner: &'r R,
}

impl<'r, R: CommandRunner> Extractor<'r, R> {
    pub fn new(runner: &'r R) -> Self {
        Self { runner }
    }

    /// Output directory for an archive. Archives found by the walk get a
    /// directory named after the archive so several can coexist.
    pub fn output_dir_for(working_dir: &Utf8Path, archive: &Utf8Path, origin: CandidateOrigin) -> Utf8PathBuf {
        match (origin, archive.file_stem()) {
            (CandidateOrigin::Walk, Some(stem)) if !stem.is_empty() => working_dir.join(stem),
            _ => working_dir.join(EXTRACTED_ARCHIVE_DIR),
        }
    }

    /// Unpack `archive` into `output_dir` with the packer's invocation variants.
    ///
    /// The output directory is emptied before each variant. When every
    /// variant fails it is removed, so no partial output is left behind.
    pub async fn extract_archive(
        &self,
        npm: &Utf8Path,
        package: &str,
        archive: &Utf8Path,
        output_dir: &Utf8Path,
    ) -> Result<ExtractionResult, WorkflowError> {
        tracing::info!("Extracting {}...", archive);

        let commands = AsarCommands::new(npm, package);
        let mut chain = Fallback::new("Extract");
        for (label, invocation) in commands.variants(AsarOperation::Extract, archive, output_dir) {
            chain = chain.attempt(label, async move {
                reset_dir(output_dir).map_err(|e| format!("{:#}", e))?;
                run_attempt(self.runner, &invocation).await.map(|_| ())
            });
        }

        match chain.run().await {
            Ok(success) => {
                tracing::info!("Successfully extracted to: {} ({})", output_dir, success.label);
                let result = ExtractionResult::capture(
                    ExtractionSource::Archive(archive.to_path_buf()),
                    output_dir,
                )?;
                Ok(result)
            }
            Err(attempts) => {
                for failure in &attempts {
                    tracing::error!("{}", failure);
                }
                if output_dir.exists() {
                    fs::remove_dir_all(output_dir)
                        .with_context(|| format!("Failed to remove partial output: {}", output_dir))?;
                }
                Err(WorkflowError::ExtractionFailed {
                    archive: archive.to_path_buf(),
                    attempts,
                })
            }
        }
    }

    /// Copy an unpacked resource directory as-is. No packer involved.
    pub fn copy_unpacked(
        &self,
        resources: &Utf8Path,
        output_dir: &Utf8Path,
    ) -> Result<ExtractionResult, WorkflowError> {
        tracing::info!("Found resources directory, copying contents...");
        reset_dir(output_dir)?;
        let copied = copy_tree(resources, output_dir)?;
        tracing::info!("Copied {} files to: {}", copied, output_dir);

        Ok(ExtractionResult::capture(
            ExtractionSource::UnpackedResources(resources.to_path_buf()),
            output_dir,
        )?)
    }

    /// Copy loose script files, keeping their paths relative to `app_dir`.
    pub fn copy_scripts(
        &self,
        app_dir: &Utf8Path,
        files: &[Utf8PathBuf],
        output_dir: &Utf8Path,
    ) -> Result<ExtractionResult, WorkflowError> {
        reset_dir(output_dir)?;

        for file in files {
            let relative = file
                .strip_prefix(app_dir)
                .with_context(|| format!("{} is not under {}", file, app_dir))?;
            copy_file(file, &output_dir.join(relative))?;
        }
        tracing::info!("Copied {} script files to: {}", files.len(), output_dir);

        Ok(ExtractionResult::capture(
            ExtractionSource::LooseScripts(app_dir.to_path_buf()),
            output_dir,
        )?)
    }

    /// Discover and extract the session's selected application.
    ///
    /// npm is only required when an archive has to be unpacked.
    pub async fn run(&self, session: &Session) -> Result<ExtractionResult, WorkflowError> {
        let selection = session.require_selection()?;
        let working_dir = session
            .working_dir
            .clone()
            .unwrap_or_else(|| selection.working_directory(&session.tool_root));
        prepare_working_dir(&working_dir)?;

        let discovery = ArchiveDiscovery::new(&session.settings)
            .excluding([
                working_dir.clone(),
                session.tool_root.join(CONFIG_DIR_NAME),
                session.tool_root.join(LOG_DIR_NAME),
            ])
            .discover(selection)?;

        let result = match discovery {
            Discovery::Archive(candidate) => {
                let npm = session.require_tool()?;
                let output_dir = Self::output_dir_for(&working_dir, &candidate.path, candidate.origin);
                self.extract_archive(npm, &session.settings.asar_package, &candidate.path, &output_dir)
                    .await?
            }
            Discovery::UnpackedResources(dir) => {
                self.copy_unpacked(&dir, &working_dir.join(UNPACKED_RESOURCES_DIR))?
            }
            Discovery::LooseScripts { root, files } => {
                self.copy_scripts(&root, &files, &working_dir.join(EXTRACTED_SCRIPTS_DIR))?
            }
        };

        record_extraction_root(&working_dir, &result.root)?;
        tracing::info!(
            "Extraction complete: {} files from {}",
            result.file_count(),
            result.source
        );
        Ok(result)
    }
}
