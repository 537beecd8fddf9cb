//! Data models for the Electron Decompiler.
//!
//! - [`Session`]: the explicit context passed to every orchestration step (npm path,
//!   application selection, working directory, last extraction, settings)
//! - [`ApplicationSelection`]: the user's chosen application path and the search root derived from it
//! - [`ExtractionResult`]: files produced by an extraction and the fingerprints used to detect edits
//! - [`UserConfig`]: user preferences loaded from `Settings.yaml`
//!
//! # Architecture Note
//!
//! [`Session`] is wrapped in `Arc<RwLock<>>` by [`StateManager`](crate::state::StateManager).
//! Services never read ambient state; they receive a session snapshot and return results.

pub mod config;
pub mod session;

pub use config::{DecompilerSettings, UserConfig};
pub use session::{
    ARCHIVE_EXTENSION, ApplicationSelection, ExtractionResult, ExtractionSource, FileFingerprint,
    Session, WORKING_DIR_MARKER, is_working_dir, prepare_working_dir, record_extraction_root,
    recorded_extraction_root,
};
