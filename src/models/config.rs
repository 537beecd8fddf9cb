use serde::{Deserialize, Serialize};

/// User configuration from `Settings.yaml`
///
/// Contains tool lookup overrides, subprocess limits and search bounds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(rename = "Decompiler_Settings", default)]
    pub settings: DecompilerSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecompilerSettings {
    /// Explicit npm invoker path. Checked before PATH when non-empty.
    #[serde(rename = "NPM Path", default)]
    pub npm_path: String,

    /// Package/binary name passed to `npm exec` and run as the global binary.
    #[serde(rename = "ASAR Package", default = "default_asar_package")]
    pub asar_package: String,

    /// Per-invocation timeout for external commands, in seconds.
    #[serde(rename = "Command Timeout", default = "default_command_timeout")]
    pub command_timeout: u64,

    /// Maximum directory depth for the recursive archive search.
    #[serde(rename = "Walk Depth", default = "default_walk_depth")]
    pub walk_depth: usize,

    /// Extensions collected by the loose-script fallback.
    #[serde(rename = "Script Extensions", default = "default_script_extensions")]
    pub script_extensions: Vec<String>,

    /// npm packages installed globally by "Install Required Tools".
    #[serde(rename = "Global Tools", default = "default_global_tools")]
    pub global_tools: Vec<String>,

    #[serde(rename = "Open Explorer", default = "default_true")]
    pub open_explorer: bool,

    #[serde(rename = "Debug Mode", default)]
    pub debug_mode: bool,
}

impl Default for DecompilerSettings {
    fn default() -> Self {
        Self {
            npm_path: String::new(),
            asar_package: default_asar_package(),
            command_timeout: default_command_timeout(),
            walk_depth: default_walk_depth(),
            script_extensions: default_script_extensions(),
            global_tools: default_global_tools(),
            open_explorer: true,
            debug_mode: false,
        }
    }
}

fn default_asar_package() -> String {
    "asar".to_string()
}

fn default_command_timeout() -> u64 {
    300
}

fn default_walk_depth() -> usize {
    5
}

fn default_true() -> bool {
    true
}

fn default_script_extensions() -> Vec<String> {
    ["js", "mjs", "cjs", "ts"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_global_tools() -> Vec<String> {
    [
        "electron-fiddle",
        "asar",
        "source-map-explorer",
        "electron-devtools-installer",
        "electron-debug",
        "devtron",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl DecompilerSettings {
    /// The configured npm override, if any.
    pub fn npm_override(&self) -> Option<&str> {
        let trimmed = self.npm_path.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    /// Case-insensitive check against the script extension list.
    pub fn is_script_extension(&self, extension: &str) -> bool {
        self.script_extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }
}
