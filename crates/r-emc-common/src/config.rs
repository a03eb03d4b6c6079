//! ---
//! emc_section: "01-core-functionality"
//! emc_subsection: "module"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Shared primitives and utilities for the workspace."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::logging::LogFormat;

fn default_true() -> bool {
    true
}

fn default_store_path() -> PathBuf {
    PathBuf::from("target/emc/messages.json")
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// Primary configuration object for R-EMC tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    /// `None` when no file was found and defaults are in effect.
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "R_EMC_CONFIG";

    /// Load configuration from disk, respecting the `R_EMC_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Self::load_with_source(candidates)?
            .map(|loaded| loaded.config)
            .ok_or_else(|| {
                anyhow!(
                    "no configuration files found. inspected: {}",
                    candidates
                        .iter()
                        .map(|p| p.as_ref().display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }

    /// Like [`AppConfig::load`] but falls back to defaults when no file exists.
    pub fn load_or_default<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        match Self::load_with_source(candidates)? {
            Some(loaded) => Ok(loaded),
            None => {
                debug!("no configuration file found; using defaults");
                Ok(LoadedAppConfig {
                    config: AppConfig::default(),
                    source: None,
                })
            }
        }
    }

    /// Locate and parse the first existing configuration file.
    ///
    /// An explicit `R_EMC_CONFIG` path must exist; candidates are optional.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<Option<LoadedAppConfig>> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(Some(LoadedAppConfig {
                    config,
                    source: Some(path),
                }));
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(Some(LoadedAppConfig {
                    config,
                    source: Some(path.to_path_buf()),
                }));
            }
        }
        Ok(None)
    }

    /// Parse and validate a configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        contents
            .parse::<AppConfig>()
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.store.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Reconciliation engine switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fold sent direction/amplitude/settings updates into emitter views.
    #[serde(default = "default_true")]
    pub fold_updates: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { fold_updates: true }
    }
}

/// Message store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Optional JSON-lines journal of store operations.
    #[serde(default)]
    pub journal: Option<PathBuf>,
    /// Refuse transmissions the eligibility engine reports as ineligible.
    #[serde(default = "default_true")]
    pub enforce_eligibility: bool,
    /// Require explicit confirmation before overwriting conflicting saves.
    #[serde(default = "default_true")]
    pub require_confirmation: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            journal: None,
            enforce_eligibility: true,
            require_confirmation: true,
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(anyhow!("store.path must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
    /// Also write a rolling JSON log file under `directory`.
    #[serde(default)]
    pub file_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
            file_output: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Print gathered Prometheus metrics after each CLI command.
    #[serde(default)]
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: AppConfig = "".parse().unwrap();
        assert!(config.engine.fold_updates);
        assert!(config.store.enforce_eligibility);
        assert!(config.store.require_confirmation);
        assert!(config.store.journal.is_none());
        assert_eq!(config.store.path, default_store_path());
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn sections_override_defaults() {
        let config: AppConfig = r#"
            [engine]
            fold_updates = false

            [store]
            path = "/var/lib/emc/messages.json"
            journal = "/var/lib/emc/journal.jsonl"
            enforce_eligibility = false

            [logging]
            format = "structured-json"
            file_output = true
        "#
        .parse()
        .unwrap();
        assert!(!config.engine.fold_updates);
        assert_eq!(config.store.path, PathBuf::from("/var/lib/emc/messages.json"));
        assert_eq!(
            config.store.journal.as_deref(),
            Some(Path::new("/var/lib/emc/journal.jsonl"))
        );
        assert!(!config.store.enforce_eligibility);
        assert!(config.store.require_confirmation);
        assert_eq!(config.logging.format, LogFormat::StructuredJson);
        assert!(config.logging.file_output);
    }

    #[test]
    fn empty_store_path_is_rejected() {
        let err = "[store]\npath = \"\"\n".parse::<AppConfig>().unwrap_err();
        assert!(format!("{err:#}").contains("store.path"));
    }

    #[test]
    fn candidates_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let loaded = AppConfig::load_or_default(&[missing]).unwrap();
        assert!(loaded.source.is_none());

        let present = dir.path().join("emc.toml");
        fs::write(&present, "[metrics]\nenabled = true\n").unwrap();
        let loaded = AppConfig::load_or_default(&[present.clone()]).unwrap();
        assert_eq!(loaded.source.as_deref(), Some(present.as_path()));
        assert!(loaded.config.metrics.enabled);
    }
}
