// State management module
//
// This module provides the StateManager which wraps the Session with thread-safe access
// using Arc<RwLock<T>> and emits change events for the console.

use crate::models::{ApplicationSelection, ExtractionResult, Session, UserConfig};
use crate::services::WorkflowError;
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Change events emitted when the session is modified
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// A new application was selected
    ApplicationSelected {
        path: Utf8PathBuf,
        working_dir: Utf8PathBuf,
    },

    /// The npm invoker was located (or lost)
    ToolLocated { path: Option<Utf8PathBuf> },

    /// An extraction finished and replaced the previous result
    ExtractionCompleted { root: Utf8PathBuf, file_count: usize },

    /// Current operation has changed
    OperationChanged { operation: String },

    /// Settings have been updated
    SettingsChanged,

    /// A repack finished; `replaced` is the original archive that now holds the new contents
    RepackFinished { replaced: Option<Utf8PathBuf> },
}

/// Thread-safe session holder with event emission
///
/// - [`read()`](Self::read) / [`snapshot()`](Self::snapshot) for reading
/// - [`update()`](Self::update) for mutations with automatic event emission
/// - [`subscribe()`](Self::subscribe) for listening to changes
///
/// Services take a [`Session`] snapshot; only the console writes back through here.
pub struct StateManager {
    state: Arc<RwLock<Session>>,
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Create a manager for a session rooted at `tool_root`.
    ///
    /// The broadcast channel buffers 100 events.
    pub fn new(tool_root: impl Into<Utf8PathBuf>) -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(Session::new(tool_root))),
            state_tx,
        }
    }

    /// Clone of the current session, safe to hand to an async step.
    pub fn snapshot(&self) -> Session {
        self.read(Session::clone)
    }

    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Session) -> R,
    {
        // A panicked writer leaves a complete Session behind; keep using it
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Apply `update_fn`, then emit one event per detected change.
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut Session),
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = detect_changes(&old_state, &state);
        for change in &changes {
            // No subscribers is fine
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    // Convenience methods for common updates

    /// Select an application; its working directory is derived from the tool
    /// root and created. On error the session is left as it was.
    pub fn select_application(
        &self,
        selection: ApplicationSelection,
    ) -> Result<Vec<StateChange>, WorkflowError> {
        let mut outcome = Ok(());
        let changes = self.update(|session| {
            outcome = session.select_application(selection).map(|_| ());
        });
        outcome.map(|()| changes)
    }

    pub fn set_npm_path(&self, path: Option<Utf8PathBuf>) -> Vec<StateChange> {
        self.update(|session| session.npm_path = path)
    }

    pub fn set_operation(&self, operation: impl Into<String>) -> Vec<StateChange> {
        let operation = operation.into();
        self.update(|session| session.current_operation = operation)
    }

    pub fn clear_operation(&self) -> Vec<StateChange> {
        self.update(|session| session.current_operation.clear())
    }

    pub fn record_extraction(&self, extraction: ExtractionResult) -> Vec<StateChange> {
        self.update(|session| session.extraction = Some(extraction))
    }

    /// Report the end of a repack. Not derivable from the session, so sent explicitly.
    pub fn finish_repack(&self, replaced: Option<&Utf8Path>) -> Vec<StateChange> {
        let event = StateChange::RepackFinished {
            replaced: replaced.map(Utf8Path::to_path_buf),
        };
        let _ = self.state_tx.send(event.clone());
        vec![event]
    }

    /// Load settings from the user configuration.
    pub fn load_from_user_config(&self, user_config: &UserConfig) -> Vec<StateChange> {
        self.update(|session| {
            session.settings = user_config.settings.clone();
            tracing::info!(
                "Loaded user config: asar package={}, timeout={}s, walk depth={}",
                session.settings.asar_package,
                session.settings.command_timeout,
                session.settings.walk_depth
            );
        })
    }
}

/// Compare two sessions and describe what changed.
fn detect_changes(old: &Session, new: &Session) -> Vec<StateChange> {
    let mut changes = Vec::new();

    if old.selection != new.selection
        && let (Some(selection), Some(working_dir)) = (&new.selection, &new.working_dir)
    {
        changes.push(StateChange::ApplicationSelected {
            path: selection.path().to_path_buf(),
            working_dir: working_dir.clone(),
        });
    }

    if old.npm_path != new.npm_path {
        changes.push(StateChange::ToolLocated {
            path: new.npm_path.clone(),
        });
    }

    let extraction_key = |s: &Session| {
        s.extraction
            .as_ref()
            .map(|e| (e.root.clone(), e.files.clone()))
    };
    if let Some(extraction) = &new.extraction
        && extraction_key(old) != extraction_key(new)
    {
        changes.push(StateChange::ExtractionCompleted {
            root: extraction.root.clone(),
            file_count: extraction.file_count(),
        });
    }

    if old.current_operation != new.current_operation {
        changes.push(StateChange::OperationChanged {
            operation: new.current_operation.clone(),
        });
    }

    if old.settings != new.settings {
        changes.push(StateChange::SettingsChanged);
    }

    changes
}

impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
        }
    }
}
