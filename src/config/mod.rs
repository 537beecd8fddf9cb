use crate::models::UserConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Name of the configuration directory created next to the executable.
pub const CONFIG_DIR_NAME: &str = "Electron Decompiler Data";

/// Where a loaded configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsSource {
    File,
    /// No settings file exists; every value is a default.
    Defaults,
}

/// Configuration manager for loading and saving the YAML settings file.
///
/// Manages `Settings.yaml` inside the configuration directory. A missing file
/// is not an error: defaults are used and the file is only written on save.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing configuration files (e.g., "Electron Decompiler Data")
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            settings_path: config_dir.join("Settings.yaml"),
            config_dir,
        })
    }

    /// Load the user configuration file.
    ///
    /// # Returns
    /// The loaded UserConfig, or default if file doesn't exist
    pub fn load_user_config(&self) -> Result<UserConfig> {
        let (config, source) = self.load_with_source()?;
        match source {
            SettingsSource::File => tracing::info!("Loaded settings from {}", self.settings_path),
            SettingsSource::Defaults => tracing::warn!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            ),
        }
        Ok(config)
    }

    /// Load without logging, reporting whether the file existed.
    ///
    /// For callers that read settings before a subscriber is installed.
    pub fn load_with_source(&self) -> Result<(UserConfig, SettingsSource)> {
        if !self.settings_path.exists() {
            return Ok((UserConfig::default(), SettingsSource::Defaults));
        }

        let file_contents = fs::read_to_string(&self.settings_path)
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?;

        let config: UserConfig = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        Ok((config, SettingsSource::File))
    }

    /// Save the user configuration file.
    pub fn save_user_config(&self, config: &UserConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Get the settings file path.
    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }
}
