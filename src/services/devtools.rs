//! Developer helpers around an extraction: global tool installation,
//! source-map analysis and the DevTools config artifact.

use crate::services::fs_ops::utf8_entry;
use crate::services::runner::{CommandRunner, Invocation, run_attempt};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fs;
use walkdir::WalkDir;

/// File name of the DevTools configuration written to the working directory.
pub const DEV_CONFIG_FILE: &str = "dev-config.json";

const SOURCE_MAP_SUFFIX: &str = ".js.map";
const SOURCE_MAP_EXPLORER: &str = "source-map-explorer";

/// Outcome of installing one global npm package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolInstall {
    pub tool: String,
    pub error: Option<String>,
}

impl ToolInstall {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// `npm install -g <tool>` for each tool, one at a time. A failure is
/// recorded and the next tool is still attempted.
pub async fn install_tools<R: CommandRunner>(
    runner: &R,
    npm: &Utf8Path,
    tools: &[String],
) -> Vec<ToolInstall> {
    let mut results = Vec::with_capacity(tools.len());

    for tool in tools {
        tracing::info!("Installing {}...", tool);
        let invocation = Invocation::new(npm.as_str()).args(["install", "-g", tool.as_str()]);

        let error = match run_attempt(runner, &invocation).await {
            Ok(_) => {
                tracing::info!("Successfully installed {}", tool);
                None
            }
            Err(diagnostic) => {
                tracing::error!("Error installing {}: {}", tool, diagnostic);
                Some(diagnostic)
            }
        };
        results.push(ToolInstall {
            tool: tool.clone(),
            error,
        });
    }

    results
}

/// Every `*.js.map` under `root` whose sibling `.js` file exists, paired as
/// `(map, script)`.
pub fn find_source_maps(root: &Utf8Path) -> Vec<(Utf8PathBuf, Utf8PathBuf)> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| utf8_entry(entry.into_path()))
        .filter_map(|map| {
            if !map.as_str().ends_with(SOURCE_MAP_SUFFIX) {
                return None;
            }
            let script = Utf8PathBuf::from(map.as_str().strip_suffix(".map")?);
            script.is_file().then_some((map, script))
        })
        .collect()
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceMapReport {
    pub analyzed: usize,
    pub failed: Vec<Utf8PathBuf>,
}

/// Run `source-map-explorer` on every script with a source map under `root`.
pub async fn analyze_source_maps<R: CommandRunner>(runner: &R, root: &Utf8Path) -> SourceMapReport {
    let explorer = which::which(SOURCE_MAP_EXPLORER)
        .ok()
        .and_then(utf8_entry)
        .map(Utf8PathBuf::into_string)
        .unwrap_or_else(|| SOURCE_MAP_EXPLORER.to_string());

    let mut report = SourceMapReport::default();
    let maps = find_source_maps(root);
    if maps.is_empty() {
        tracing::info!("No source maps found under {}", root);
    }

    for (map, script) in maps {
        tracing::info!("Analyzing source map: {}", map);
        let invocation = Invocation::new(explorer.as_str()).arg(script.as_str());
        match run_attempt(runner, &invocation).await {
            Ok(output) => {
                if !output.stdout.trim().is_empty() {
                    tracing::info!("{}", output.stdout.trim());
                }
                report.analyzed += 1;
            }
            Err(diagnostic) => {
                tracing::error!("Error analyzing source map {}: {}", map, diagnostic);
                report.failed.push(map);
            }
        }
    }

    report
}

/// DevTools switches for the app's main process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevConfig {
    pub dev_tools: bool,
    pub open_dev_tools: bool,
    pub devtron: bool,
    pub source_map_support: bool,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            dev_tools: true,
            open_dev_tools: true,
            devtron: true,
            source_map_support: true,
        }
    }
}

/// Write `dev-config.json` into `working_dir`, returning its path.
pub fn write_dev_config(working_dir: &Utf8Path) -> Result<Utf8PathBuf> {
    let path = working_dir.join(DEV_CONFIG_FILE);
    fs::create_dir_all(working_dir)
        .with_context(|| format!("Failed to create directory: {}", working_dir))?;

    let json = serde_json::to_string_pretty(&DevConfig::default())
        .context("Failed to serialize dev config")?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path))?;

    tracing::info!("Development configuration created: {}", path);
    Ok(path)
}
