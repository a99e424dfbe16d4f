use serde::{Deserialize, Serialize};

use atr_core::ResourceType;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub export: ExportSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Search validations
        if self.search.max_count == 0 {
            return Err("search.max_count must be > 0".into());
        }
        if let Some(default_count) = self.search.default_count {
            if default_count == 0 {
                return Err("search.default_count must be > 0".into());
            }
            if default_count > self.search.max_count {
                return Err("search.default_count must be <= search.max_count".into());
            }
        }
        // Export validations
        if self.export.batch_size == 0 {
            return Err("export.batch_size must be > 0".into());
        }
        if self.export.max_parallel_types == 0 {
            return Err("export.max_parallel_types must be > 0".into());
        }
        for name in &self.export.resource_types {
            name.parse::<ResourceType>()
                .map_err(|_| format!("export.resource_types: unknown resource type '{name}'"))?;
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Page size applied when a request carries no count; unlimited when unset
    #[serde(default)]
    pub default_count: Option<usize>,
    #[serde(default = "default_search_max")]
    pub max_count: usize,
}
fn default_search_max() -> usize {
    1000
}
impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_count: None,
            max_count: default_search_max(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Rows fetched per store query while exporting one type
    #[serde(default = "default_export_batch")]
    pub batch_size: usize,
    #[serde(default = "default_export_parallel")]
    pub max_parallel_types: usize,
    /// Types this deployment exports; empty means every type with an export profile
    #[serde(default)]
    pub resource_types: Vec<String>,
}
fn default_export_batch() -> usize {
    500
}
fn default_export_parallel() -> usize {
    4
}
impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            batch_size: default_export_batch(),
            max_parallel_types: default_export_parallel(),
            resource_types: Vec::new(),
        }
    }
}

impl ExportSettings {
    /// Whether the allow list admits the type.
    pub fn allows(&self, resource_type: ResourceType) -> bool {
        self.resource_types.is_empty()
            || self
                .resource_types
                .iter()
                .any(|name| name == resource_type.as_str())
    }
}

/// How version tags are produced on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VersioningMode {
    /// Every write is tagged "1"
    #[default]
    Constant,
    /// 1, 2, 3, ... per resource
    Sequential,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageSettings {
    #[serde(default)]
    pub versioning: VersioningMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::{Path, PathBuf};

    pub const DEFAULT_CONFIG_FILE: &str = "atr.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        } else if path.is_some() {
            tracing::warn!(path = %pathbuf.display(), "config file not found, using defaults");
        }
        // Environment variable overrides, e.g., ATR__SEARCH__MAX_COUNT=200
        builder = builder.add_source(
            Environment::with_prefix("ATR")
                .try_parsing(true)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("export.resource_types"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }

    pub fn load_config_with_default_path<P: AsRef<Path>>(
        path: Option<P>,
    ) -> Result<AppConfig, String> {
        let p = path
            .as_ref()
            .map(|p| p.as_ref().to_string_lossy().to_string());
        load_config(p.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.search.default_count, None);
        assert_eq!(cfg.storage.versioning, VersioningMode::Constant);
        assert!(cfg.export.allows(ResourceType::Coverage));
    }

    #[test]
    fn test_rejects_zero_sizes() {
        let mut cfg = AppConfig::default();
        cfg.export.batch_size = 0;
        assert!(cfg.validate().unwrap_err().contains("batch_size"));

        let mut cfg = AppConfig::default();
        cfg.search.default_count = Some(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_export_allow_list() {
        let mut cfg = AppConfig::default();
        cfg.export.resource_types = vec!["Coverage".into()];
        assert!(cfg.validate().is_ok());
        assert!(cfg.export.allows(ResourceType::Coverage));
        assert!(!cfg.export.allows(ResourceType::MedicationStatement));

        cfg.export.resource_types = vec!["Spaceship".into()];
        assert!(cfg.validate().unwrap_err().contains("Spaceship"));
    }
}
