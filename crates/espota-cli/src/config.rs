//! Configuration file handling for espota

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use espota_client::firmware::default_firmware_paths;
use espota_client::{SequencerConfig, DEFAULT_PORT};
use serde::{Deserialize, Serialize};

/// Configuration for the CLI tool
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default device HTTP port
    pub port: Option<u16>,
    /// Disable colored output
    pub no_color: Option<bool>,
    /// Firmware files checked by `list`
    pub firmware_paths: Option<Vec<PathBuf>>,
    /// YAML file with sequencer endpoints, timeouts and recovery policy
    pub sequencer: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// A missing file means defaults; an unreadable or malformed one is an
    /// error.
    pub fn load() -> Result<Self> {
        let Ok(config_path) = Self::config_path() else {
            return Ok(Self::default());
        };
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("espota");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(&self, no_color: bool) -> MergedConfig {
        MergedConfig {
            port: self.port.unwrap_or(DEFAULT_PORT),
            no_color: no_color || self.no_color.unwrap_or(false),
            firmware_paths: self
                .firmware_paths
                .clone()
                .unwrap_or_else(default_firmware_paths),
            sequencer_path: self.sequencer.clone(),
        }
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub port: u16,
    pub no_color: bool,
    pub firmware_paths: Vec<PathBuf>,
    pub sequencer_path: Option<PathBuf>,
}

impl MergedConfig {
    /// Load the sequencer policy; only commands that talk to a device need it
    pub fn sequencer_config(&self) -> Result<SequencerConfig> {
        match &self.sequencer_path {
            Some(path) => SequencerConfig::from_yaml_file(path).with_context(|| {
                format!("Failed to load sequencer config: {}", path.display())
            }),
            None => Ok(SequencerConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let merged = Config::default().merge_with_args(false);
        assert_eq!(merged.port, 80);
        assert!(!merged.no_color);
        assert_eq!(merged.firmware_paths, default_firmware_paths());
        assert_eq!(merged.sequencer_config().unwrap(), SequencerConfig::default());
    }

    #[test]
    fn test_toml_parsing() {
        let config: Config = toml::from_str(
            r#"
port = 8080
no_color = true
firmware_paths = ["out/app.bin"]
"#,
        )
        .unwrap();

        let merged = config.merge_with_args(false);
        assert_eq!(merged.port, 8080);
        assert!(merged.no_color);
        assert_eq!(merged.firmware_paths, vec![PathBuf::from("out/app.bin")]);
    }

    #[test]
    fn test_no_color_flag_wins() {
        let config = Config {
            no_color: Some(false),
            ..Default::default()
        };
        assert!(config.merge_with_args(true).no_color);
    }

    #[test]
    fn test_sequencer_file() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("sequencer.yaml");
        std::fs::write(&yaml, "recovery:\n  max_attempts: 60\n").unwrap();

        let config_file = dir.path().join("config.toml");
        std::fs::write(
            &config_file,
            format!("sequencer = {:?}\n", yaml.display().to_string()),
        )
        .unwrap();

        let sequencer = Config::load_from(&config_file)
            .unwrap()
            .merge_with_args(false)
            .sequencer_config()
            .unwrap();
        assert_eq!(sequencer.recovery.max_attempts, 60);
        assert_eq!(sequencer.recovery.grace_ms, 5000);
    }

    #[test]
    fn test_missing_sequencer_file() {
        let config = Config {
            sequencer: Some(PathBuf::from("/nonexistent/sequencer.yaml")),
            ..Default::default()
        };
        let merged = config.merge_with_args(false);
        assert_eq!(merged.firmware_paths, default_firmware_paths());
        assert!(merged.sequencer_config().is_err());
    }

    #[test]
    fn test_malformed_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_file = dir.path().join("config.toml");
        std::fs::write(&config_file, "port = \"eighty\"\n").unwrap();

        assert!(Config::load_from(&config_file).is_err());
    }

    #[test]
    fn test_config_path() {
        if let Ok(path) = Config::config_path() {
            assert!(path.ends_with("espota/config.toml"));
        }
    }
}
