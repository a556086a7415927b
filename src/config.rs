//! Application configuration.
//!
//! Both components are configured from one TOML document:
//!
//! ```toml
//! [pager]
//! loading_strategy = "as_needed"
//! sort_fields = ["name"]
//! group_by_field = "name"
//!
//! [storage]
//! writable_dir = "/storage/sdcard0/MapsWithMe"
//! extra_storage_dirs = ["/storage/sdcard1"]
//! ```

use crate::graph::types::PagerConfig;
use crate::storage::types::StorageConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid value for '{field}': {message}")]
    Invalid { field: &'static str, message: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pager: PagerConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the picker cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let at_least_one = [
            ("pager.max_prefetched_pictures", self.pager.max_prefetched_pictures),
            ("pager.max_concurrent_downloads", self.pager.max_concurrent_downloads),
        ];
        for (field, value) in at_least_one {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    message: "must be at least 1".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Save to TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = self.to_toml_string()?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::LoadingStrategy;
    use std::time::Duration;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [pager]
            loading_strategy = "as_needed"
            group_by_field = "category"

            [storage]
            writable_dir = "/storage/sdcard1/MapsWithMe"
            extra_storage_dirs = ["/storage/usb"]
            "#,
        )
        .unwrap();

        assert_eq!(config.pager.loading_strategy, LoadingStrategy::AsNeeded);
        assert_eq!(config.pager.group_by_field.as_deref(), Some("category"));
        assert_eq!(config.pager.max_prefetched_pictures, 20);
        assert_eq!(config.pager.cached_result_refresh_delay, Duration::from_secs(2));
        assert_eq!(
            config.storage.writable_dir,
            PathBuf::from("/storage/sdcard1/MapsWithMe")
        );
        assert_eq!(config.storage.extra_storage_dirs, vec![PathBuf::from("/storage/usb")]);
    }

    #[test]
    fn test_empty_config_is_default() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.pager.loading_strategy, LoadingStrategy::Immediate);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_invalid_config() {
        let result = AppConfig::from_toml_str("[pager]\nloading_strategy = \"sometimes\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_zero_capacities_rejected() {
        let result = AppConfig::from_toml_str("[pager]\nmax_prefetched_pictures = 0");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "pager.max_prefetched_pictures",
                ..
            })
        ));

        let result = AppConfig::from_toml_str("[pager]\nmax_concurrent_downloads = 0");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "pager.max_concurrent_downloads",
                ..
            })
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = AppConfig::from_toml_file("/nonexistent/pickerkit.toml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
