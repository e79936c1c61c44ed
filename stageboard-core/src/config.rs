//! Pipeline configuration
//!
//! Loaded from YAML, optionally pointed at by `STAGEBOARD_CONFIG`:
//!
//! ```yaml
//! optimistic_updates: true
//! return_url: /boards/commissions
//! catalog_path: stages.yaml      # or an inline `catalog:` block
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::registry::{CatalogDef, RegistryCatalog, RegistryError};

pub const ENV_CONFIG_PATH: &str = "STAGEBOARD_CONFIG";
pub const ENV_OPTIMISTIC: &str = "STAGEBOARD_OPTIMISTIC";
pub const ENV_RETURN_URL: &str = "STAGEBOARD_RETURN_URL";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Show stage changes before storage confirms them
    #[serde(default)]
    pub optimistic_updates: bool,

    /// Where login sends the user back to after re-authentication
    #[serde(default = "default_return_url")]
    pub return_url: String,

    /// Inline registry overrides
    #[serde(default)]
    pub catalog: Option<CatalogDef>,

    /// Registry overrides file, resolved relative to the config file
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
}

fn default_return_url() -> String {
    "/".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            optimistic_updates: false,
            return_url: default_return_url(),
            catalog: None,
            catalog_path: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str(&content)?;

        if let (Some(catalog_path), Some(dir)) = (&config.catalog_path, path.parent()) {
            if catalog_path.is_relative() {
                config.catalog_path = Some(dir.join(catalog_path));
            }
        }

        Ok(config)
    }

    /// File named by `STAGEBOARD_CONFIG` (defaults otherwise), then env overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(ENV_CONFIG_PATH) {
            Ok(path) if !path.trim().is_empty() => Self::load(Path::new(path.trim()))?,
            _ => Self::default(),
        };

        if let Ok(value) = std::env::var(ENV_OPTIMISTIC) {
            config.optimistic_updates = parse_bool(&value).ok_or(ConfigError::InvalidEnv {
                var: ENV_OPTIMISTIC,
                value,
            })?;
        }
        if let Ok(value) = std::env::var(ENV_RETURN_URL) {
            if !value.trim().is_empty() {
                config.return_url = value;
            }
        }

        Ok(config)
    }

    /// Built-in registries with the configured overrides applied
    pub fn build_catalog(&self) -> Result<RegistryCatalog, ConfigError> {
        let mut def = CatalogDef::default();
        if let Some(path) = &self.catalog_path {
            let content = std::fs::read_to_string(path)?;
            let from_file: CatalogDef = serde_yaml::from_str(&content)?;
            def.domains.extend(from_file.domains);
        }
        if let Some(inline) = &self.catalog {
            def.domains.extend(inline.domains.iter().cloned());
        }
        Ok(RegistryCatalog::from_def(&def)?)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
