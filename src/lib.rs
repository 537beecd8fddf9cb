// Electron Decompiler - Locate, extract and repack Electron ASAR archives
//
// This is the library crate containing the discovery and orchestration logic.
// The binary crate (main.rs) provides the interactive console entry point.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use models::{ApplicationSelection, DecompilerSettings, ExtractionResult, Session, UserConfig};
pub use services::WorkflowError;
pub use state::{StateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
