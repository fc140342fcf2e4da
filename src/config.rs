//! Engine configuration.
//!
//! Stored as JSON in the platform config directory
//! (`~/.config/modelcat/config.json` on Linux). Every field has a default so
//! partial files are accepted.

use crate::error::CatalogError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_NAME: &str = "modelcat";
const CONFIG_FILE: &str = "config.json";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub offload: OffloadConfig,
    #[serde(default)]
    pub hardware: HardwareConfig,
}

/// Thresholds and capacities for the query engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Datasets larger than this use the inverted index for search
    #[serde(default = "default_index_threshold")]
    pub index_threshold: usize,

    /// Datasets larger than this use categorical indexes for equality filters
    #[serde(default = "default_index_threshold")]
    pub categorical_index_threshold: usize,

    /// Candidate sets larger than this are scanned and sorted with rayon
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,

    /// Entries kept per cache tier before the oldest insertion is evicted
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Shortest token registered in the search index
    #[serde(default = "default_min_token_len")]
    pub min_token_len: usize,
}

fn default_index_threshold() -> usize {
    1_000
}

fn default_parallel_threshold() -> usize {
    20_000
}

fn default_cache_capacity() -> usize {
    150
}

fn default_min_token_len() -> usize {
    2
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            index_threshold: default_index_threshold(),
            categorical_index_threshold: default_index_threshold(),
            parallel_threshold: default_parallel_threshold(),
            cache_capacity: default_cache_capacity(),
            min_token_len: default_min_token_len(),
        }
    }
}

/// Background execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffloadConfig {
    /// Allow dispatching large queries to the background worker
    #[serde(default = "default_offload_enabled")]
    pub enabled: bool,

    /// Datasets larger than this are offloaded when a worker is available
    #[serde(default = "default_offload_threshold")]
    pub threshold: usize,

    /// Round-trip budget before falling back to the calling thread
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Records scanned between cooperative yields on the calling thread
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_offload_enabled() -> bool {
    true
}

fn default_offload_threshold() -> usize {
    10_000
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_batch_size() -> usize {
    5_000
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self {
            enabled: default_offload_enabled(),
            threshold: default_offload_threshold(),
            timeout_ms: default_timeout_ms(),
            batch_size: default_batch_size(),
        }
    }
}

impl OffloadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Parameters for deriving hardware requirements of records that lack them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareConfig {
    /// Base RAM as a multiple of file size
    #[serde(default = "default_ram_multiplier")]
    pub ram_multiplier: f64,
    /// Fractional RAM reduction for 4-bit and smaller quantizations
    #[serde(default = "default_quantization_ram_reduction")]
    pub quantization_ram_reduction: f64,
    #[serde(default = "default_small_model_threshold")]
    pub small_model_threshold: u64,
    #[serde(default = "default_medium_model_threshold")]
    pub medium_model_threshold: u64,
    #[serde(default = "default_large_model_threshold")]
    pub large_model_threshold: u64,
    /// Parameter count at which a GPU becomes required
    #[serde(default = "default_large_model_threshold")]
    pub gpu_required_threshold: u64,
    #[serde(default = "default_os_support")]
    pub default_os_support: Vec<String>,
}

fn default_ram_multiplier() -> f64 {
    2.0
}

fn default_quantization_ram_reduction() -> f64 {
    0.3
}

fn default_small_model_threshold() -> u64 {
    2_000_000_000
}

fn default_medium_model_threshold() -> u64 {
    7_000_000_000
}

fn default_large_model_threshold() -> u64 {
    13_000_000_000
}

fn default_os_support() -> Vec<String> {
    vec!["Windows".to_string(), "Linux".to_string(), "macOS".to_string()]
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            ram_multiplier: default_ram_multiplier(),
            quantization_ram_reduction: default_quantization_ram_reduction(),
            small_model_threshold: default_small_model_threshold(),
            medium_model_threshold: default_medium_model_threshold(),
            large_model_threshold: default_large_model_threshold(),
            gpu_required_threshold: default_large_model_threshold(),
            default_os_support: default_os_support(),
        }
    }
}

impl CatalogConfig {
    /// Load config from the app config directory, or return defaults if absent
    pub fn load() -> Result<Self> {
        match get_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load config from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: CatalogConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the app config directory
    pub fn save(&self) -> Result<PathBuf> {
        let path = get_config_path().context("No config directory on this platform")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config file")?;
        Ok(path)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut problems = Vec::new();

        if self.engine.cache_capacity == 0 {
            problems.push("engine.cache_capacity must be positive");
        }
        if self.engine.min_token_len == 0 {
            problems.push("engine.min_token_len must be positive");
        }
        if self.offload.batch_size == 0 {
            problems.push("offload.batch_size must be positive");
        }
        if self.offload.timeout_ms == 0 {
            problems.push("offload.timeout_ms must be positive");
        }

        let hw = &self.hardware;
        if hw.ram_multiplier.is_nan() || hw.ram_multiplier <= 0.0 {
            problems.push("hardware.ram_multiplier must be positive");
        }
        if !(0.0..=1.0).contains(&hw.quantization_ram_reduction) {
            problems.push("hardware.quantization_ram_reduction must be between 0 and 1");
        }
        if hw.small_model_threshold == 0 {
            problems.push("hardware.small_model_threshold must be positive");
        }
        if hw.medium_model_threshold <= hw.small_model_threshold {
            problems.push("hardware.medium_model_threshold must exceed small_model_threshold");
        }
        if hw.large_model_threshold <= hw.medium_model_threshold {
            problems.push("hardware.large_model_threshold must exceed medium_model_threshold");
        }
        if hw.gpu_required_threshold == 0 {
            problems.push("hardware.gpu_required_threshold must be positive");
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(CatalogError::Config(problems.join("; ")))
        }
    }
}

/// Path of the config file, if the platform has a config directory
pub fn get_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CatalogConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.index_threshold, 1_000);
        assert_eq!(config.offload.threshold, 10_000);
        assert_eq!(config.offload.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: CatalogConfig =
            serde_json::from_str(r#"{"engine": {"cache_capacity": 16}}"#).unwrap();
        assert_eq!(config.engine.cache_capacity, 16);
        assert_eq!(config.engine.min_token_len, 2);
        assert!(config.offload.enabled);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = CatalogConfig::default();
        config.engine.cache_capacity = 0;
        config.hardware.medium_model_threshold = 1;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("cache_capacity"));
        assert!(err.contains("medium_model_threshold"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"offload": {"enabled": false, "threshold": 50}}"#).unwrap();

        let config = CatalogConfig::load_from(&path).unwrap();
        assert!(!config.offload.enabled);
        assert_eq!(config.offload.threshold, 50);
    }
}
