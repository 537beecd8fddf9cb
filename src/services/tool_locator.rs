//! Locating the npm invoker used to reach the `asar` packer.
//!
//! Resolution order, first match wins:
//! 1. The `NPM Path` setting, when configured
//! 2. A PATH lookup for the invoker's canonical filename
//! 3. The Node.js install path recorded in the Windows registry
//! 4. A fixed list of well-known install locations, with `%VAR%` expansion

use crate::models::DecompilerSettings;
use crate::services::error::WorkflowError;
use crate::services::fallback::Fallback;
use camino::Utf8PathBuf;
use regex::Regex;
use std::env;
use std::ffi::OsString;
use std::sync::LazyLock;

/// Canonical filename of the npm invoker on this platform.
#[cfg(windows)]
pub const NPM_INVOKER: &str = "npm.cmd";
#[cfg(not(windows))]
pub const NPM_INVOKER: &str = "npm";

#[cfg(windows)]
const WELL_KNOWN_NPM_PATHS: &[&str] = &[
    r"C:\Program Files\nodejs\npm.cmd",
    r"C:\Program Files (x86)\nodejs\npm.cmd",
    r"%APPDATA%\npm\npm.cmd",
    r"%ProgramFiles%\nodejs\npm.cmd",
    r"%ProgramFiles(x86)%\nodejs\npm.cmd",
];

#[cfg(not(windows))]
const WELL_KNOWN_NPM_PATHS: &[&str] = &[
    "/usr/local/bin/npm",
    "/usr/bin/npm",
    "/opt/homebrew/bin/npm",
    "%HOME%/.npm-global/bin/npm",
    "%HOME%/.volta/bin/npm",
];

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%([^%]+)%").expect("Invalid env var regex"));

/// Expand `%NAME%` references using `lookup`.
///
/// Returns `None` if any referenced variable is undefined, so a path built on
/// a missing root is skipped instead of checked as a literal.
pub fn expand_env_vars<F>(template: &str, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing = false;
    let expanded = ENV_VAR_PATTERN.replace_all(template, |caps: &regex::Captures<'_>| {
        lookup(&caps[1]).unwrap_or_else(|| {
            missing = true;
            String::new()
        })
    });

    (!missing).then(|| expanded.into_owned())
}

/// Well-known install locations for this platform, with environment variables expanded.
pub fn default_well_known_paths() -> Vec<Utf8PathBuf> {
    WELL_KNOWN_NPM_PATHS
        .iter()
        .filter_map(|template| expand_env_vars(template, |name| env::var(name).ok()))
        .map(Utf8PathBuf::from)
        .collect()
}

/// Read the Node.js install directory recorded under `HKLM\SOFTWARE\Node.js`.
#[cfg(windows)]
pub fn registry_install_dir() -> Option<Utf8PathBuf> {
    use winreg::RegKey;
    use winreg::enums::{HKEY_LOCAL_MACHINE, KEY_READ, KEY_WOW64_64KEY};

    let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);
    let key = hklm
        .open_subkey_with_flags(r"SOFTWARE\Node.js", KEY_READ | KEY_WOW64_64KEY)
        .ok()?;
    let install_path: String = key.get_value("InstallPath").ok()?;
    Some(Utf8PathBuf::from(install_path))
}

/// There is no install registry outside Windows.
#[cfg(not(windows))]
pub fn registry_install_dir() -> Option<Utf8PathBuf> {
    None
}

/// Finds the npm invoker. Every source is injectable so tests can build a
/// locator that never touches the real environment.
#[derive(Debug, Clone)]
pub struct ToolLocator {
    invoker: String,
    configured: Option<Utf8PathBuf>,
    search_path: Option<OsString>,
    registry: fn() -> Option<Utf8PathBuf>,
    well_known: Vec<Utf8PathBuf>,
}

impl ToolLocator {
    /// Locator over the real environment.
    pub fn new() -> Self {
        Self {
            invoker: NPM_INVOKER.to_string(),
            configured: None,
            search_path: None,
            registry: registry_install_dir,
            well_known: default_well_known_paths(),
        }
    }

    /// Locator over the real environment, honoring the `NPM Path` setting.
    pub fn from_settings(settings: &DecompilerSettings) -> Self {
        Self::new().with_configured(settings.npm_override().map(Utf8PathBuf::from))
    }

    pub fn with_invoker(mut self, invoker: impl Into<String>) -> Self {
        self.invoker = invoker.into();
        self
    }

    pub fn with_configured(mut self, configured: Option<Utf8PathBuf>) -> Self {
        self.configured = configured;
        self
    }

    /// Search this PATH-style list instead of the process PATH.
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    pub fn with_registry(mut self, registry: fn() -> Option<Utf8PathBuf>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_well_known(mut self, well_known: Vec<Utf8PathBuf>) -> Self {
        self.well_known = well_known;
        self
    }

    fn check_configured(&self) -> Result<Utf8PathBuf, String> {
        match &self.configured {
            Some(path) if path.is_file() => Ok(path.clone()),
            Some(path) => Err(format!("configured path {} does not exist", path)),
            None => Err("no path configured".to_string()),
        }
    }

    fn search_path_lookup(&self) -> Result<Utf8PathBuf, String> {
        let paths = self.search_path.clone().or_else(|| env::var_os("PATH"));
        let cwd = env::current_dir().map_err(|e| e.to_string())?;

        let found = which::which_in(&self.invoker, paths, cwd)
            .map_err(|e| format!("{} not on PATH: {}", self.invoker, e))?;
        Utf8PathBuf::from_path_buf(found)
            .map_err(|p| format!("non UTF-8 path on PATH: {}", p.display()))
    }

    fn registry_lookup(&self) -> Result<Utf8PathBuf, String> {
        let install_dir = (self.registry)().ok_or("no Node.js install path in registry")?;
        let candidate = install_dir.join(&self.invoker);
        if candidate.is_file() {
            Ok(candidate)
        } else {
            Err(format!("registry install path has no {}", candidate))
        }
    }

    fn well_known_lookup(&self) -> Result<Utf8PathBuf, String> {
        self.well_known
            .iter()
            .inspect(|p| tracing::debug!("Probing {}", p))
            .find(|p| p.is_file())
            .cloned()
            .ok_or_else(|| format!("none of {} well-known paths exist", self.well_known.len()))
    }

    /// Run the resolution chain.
    pub async fn locate(&self) -> Result<Utf8PathBuf, WorkflowError> {
        let mut chain = Fallback::new("Locate npm");
        if self.configured.is_some() {
            chain = chain.attempt("configured path", async { self.check_configured() });
        }

        let found = chain
            .attempt("PATH", async { self.search_path_lookup() })
            .attempt("registry", async { self.registry_lookup() })
            .attempt("well-known paths", async { self.well_known_lookup() })
            .run()
            .await
            .map_err(|_| WorkflowError::ToolNotFound)?;

        tracing::info!("Found NPM at: {} (via {})", found.value, found.label);
        Ok(found.value)
    }
}

impl Default for ToolLocator {
    fn default() -> Self {
        Self::new()
    }
}
