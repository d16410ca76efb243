//! Configuration loading from deadexport.toml.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DeadexportError, DeadexportResult, IoResultExt};
use crate::ignore::{IgnoreEntry, IgnoreMatcher};
use crate::report::Severity;

/// Name of the project-level configuration file.
pub const CONFIG_FILE: &str = "deadexport.toml";

/// Main configuration structure for deadexport.toml.
///
/// Unknown keys are rejected so a misspelled setting never falls back to a default.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct DeadexportConfig {
    /// Ignore rules: `"owner[:name[/arity]]"` or `{ owner, name, arity }`.
    pub ignore: Option<Vec<IgnoreEntry>>,
    /// Severity for every report: hint, information, warning or error.
    pub severity: Option<String>,
    /// Manifest location, relative to the project root.
    pub manifest: Option<PathBuf>,
}

/// Validated per-session settings.
#[derive(Debug, Clone, Default)]
pub struct SessionSettings {
    pub ignore: IgnoreMatcher,
    pub severity: Severity,
    /// Overrides the default manifest location when set
    pub manifest_path: Option<PathBuf>,
}

impl DeadexportConfig {
    /// Parse TOML text. `path` is only used for error messages.
    pub fn from_toml(path: &Path, text: &str) -> DeadexportResult<Self> {
        toml::from_str(text)
            .map_err(|e| DeadexportError::config(path, format!("invalid {}: {}", CONFIG_FILE, e)))
    }

    /// Validate every setting. Malformed rules or an unknown severity fail here.
    pub fn compile(&self, root: &Path) -> DeadexportResult<SessionSettings> {
        let config_path = root.join(CONFIG_FILE);
        let as_config_error = |e: DeadexportError| DeadexportError::config(&config_path, e.to_string());

        let ignore = match &self.ignore {
            Some(entries) => IgnoreMatcher::compile(entries).map_err(as_config_error)?,
            None => IgnoreMatcher::empty(),
        };
        let severity = match &self.severity {
            Some(s) => s.parse::<Severity>().map_err(as_config_error)?,
            None => Severity::default(),
        };
        let manifest_path = self.manifest.as_ref().map(|p| root.join(p));

        Ok(SessionSettings {
            ignore,
            severity,
            manifest_path,
        })
    }
}

/// Loads configuration from deadexport.toml if it exists.
pub fn load_config(root: &Path) -> DeadexportResult<Option<DeadexportConfig>> {
    let path = root.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path).with_path(&path)?;
    DeadexportConfig::from_toml(&path, &content).map(Some)
}

/// Load and validate settings, falling back to defaults without a config file.
pub fn load_settings(root: &Path) -> DeadexportResult<SessionSettings> {
    load_config(root)?
        .unwrap_or_default()
        .compile(root)
}
