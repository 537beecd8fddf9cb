//! Services module - the locate/extract/repack workflow.
//!
//! Everything here is UI-agnostic: each step takes an explicit [`crate::models::Session`]
//! and a [`CommandRunner`], and returns a typed [`WorkflowError`] the console can report.
//!
//! # Components
//!
//! - [`fallback`]: the ordered "try each alternative, stop at first success" executor
//!   shared by every step below
//! - [`runner`]: subprocess seam ([`CommandRunner`]) and its tokio implementation
//! - [`tool_locator`]: finds the npm invoker (setting, PATH, registry, well-known paths)
//! - [`discovery`]: finds the archive, an unpacked resource tree, or loose scripts
//! - [`extraction`]: unpacks or copies what discovery found into the working directory
//! - [`repack`]: packs the working copy, backs up the originals and swaps the new archive in
//! - [`devtools`]: global tool installation, source-map analysis, `dev-config.json`
//!
//! # External tool
//!
//! Archive parsing is never done here. The `asar` CLI does it, reached through
//! `npm exec`, a global install, or `npm exec --yes` (see [`asar`]).

pub mod asar;
pub mod devtools;
pub mod discovery;
pub mod error;
pub mod extraction;
pub mod fallback;
pub mod fs_ops;
pub mod repack;
pub mod runner;
pub mod tool_locator;

pub use discovery::{ArchiveCandidate, ArchiveDiscovery, CandidateOrigin, Discovery};
pub use error::WorkflowError;
pub use extraction::Extractor;
pub use fallback::{AttemptFailure, Fallback, FallbackSuccess};
pub use repack::{
    BackupRecord, Elevation, PlatformElevation, RepackReport, RepackState, Repacker,
};
pub use runner::{CommandError, CommandOutput, CommandRunner, Invocation, TokioRunner};
pub use tool_locator::ToolLocator;
