//! Stage configuration
//!
//! Can be built in code with the `with_*` methods or loaded from a RON or
//! JSON file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::assets::IdentityResolver;
use crate::error::ConfigError;

/// Stage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Separates display name and group in a requested id (`name#group`)
    pub group_separator: char,
    /// Inserted between a taken name and its uniqueness suffix
    pub suffix_separator: char,
    /// Directory file-backed sources resolve asset names against
    pub asset_root: PathBuf,
    /// Fetch timings kept for statistics
    pub max_fetch_samples: usize,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            group_separator: '#',
            suffix_separator: '_',
            asset_root: PathBuf::from("assets"),
            max_fetch_samples: 64,
        }
    }
}

impl StageConfig {
    /// Set the group separator
    pub fn with_group_separator(mut self, separator: char) -> Self {
        self.group_separator = separator;
        self
    }

    /// Set the suffix separator
    pub fn with_suffix_separator(mut self, separator: char) -> Self {
        self.suffix_separator = separator;
        self
    }

    /// Set the asset root directory
    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = root.into();
        self
    }

    /// Set how many fetch timings to keep
    pub fn with_max_fetch_samples(mut self, samples: usize) -> Self {
        self.max_fetch_samples = samples;
        self
    }

    /// Identity resolver using this config's separators
    pub fn resolver(&self) -> IdentityResolver {
        IdentityResolver::new(self.group_separator, self.suffix_separator)
    }

    /// Parse a config from a RON string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid RON for this type
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(source)?)
    }

    /// Parse a config from a JSON string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid JSON for this type
    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Load a config file, picking the format from the extension
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the extension is neither
    /// `ron` nor `json`, or deserialization fails
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("ron") => Self::from_ron_str(&content),
            Some("json") => Self::from_json_str(&content),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or_default().to_string(),
            )),
        }
    }

    /// Save the config as pretty RON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the file cannot be written
    pub fn save_ron(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        fs::write(path, ron_string)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = StageConfig::default()
            .with_group_separator(':')
            .with_asset_root("models")
            .with_max_fetch_samples(16);
        assert_eq!(config.group_separator, ':');
        assert_eq!(config.asset_root, PathBuf::from("models"));
        assert_eq!(config.max_fetch_samples, 16);
        assert_eq!(config.suffix_separator, '_');
    }

    #[test]
    fn test_ron_partial_uses_defaults() {
        let config = StageConfig::from_ron_str("(group_separator: '@')").unwrap();
        assert_eq!(config.group_separator, '@');
        assert_eq!(config.max_fetch_samples, 64);
    }

    #[test]
    fn test_json() {
        let config =
            StageConfig::from_json_str(r#"{ "asset_root": "data/models", "max_fetch_samples": 8 }"#)
                .unwrap();
        assert_eq!(config.asset_root, PathBuf::from("data/models"));
        assert_eq!(config.max_fetch_samples, 8);
    }

    #[test]
    fn test_save_then_load_file() {
        let path = std::env::temp_dir().join("asset_stage_config_test.ron");
        let config = StageConfig::default().with_suffix_separator('-');

        config.save_ron(&path).unwrap();
        let loaded = StageConfig::load(&path);
        let _ = fs::remove_file(&path);
        assert_eq!(loaded.unwrap(), config);
    }

    #[test]
    fn test_unsupported_extension() {
        let path = std::env::temp_dir().join("asset_stage_config_test.toml");
        fs::write(&path, "group_separator = '#'").unwrap();
        let result = StageConfig::load(&path);
        let _ = fs::remove_file(&path);
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(ext)) if ext == "toml"));
    }
}
