//! Engine configuration
//!
//! Settings are plain serde structs with `#[serde(default)]` so partial JSON
//! files only override what they mention.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Feature switches. A disabled feature rejects its operations and never
/// schedules its augmentation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureFlags {
    pub insights: bool,
    pub predictions: bool,
    pub anomalies: bool,
    pub validation: bool,
    pub nlq: bool,
    pub personalization: bool,
    pub export: bool,
    pub multi_select: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self::all()
    }
}

impl FeatureFlags {
    pub fn all() -> Self {
        Self {
            insights: true,
            predictions: true,
            anomalies: true,
            validation: true,
            nlq: true,
            personalization: true,
            export: true,
            multi_select: true,
        }
    }

    /// Plain table: export and multi-select only, no augmentation jobs
    pub fn none() -> Self {
        Self {
            insights: false,
            predictions: false,
            anomalies: false,
            validation: false,
            nlq: false,
            personalization: false,
            export: true,
            multi_select: true,
        }
    }
}

/// Parameters handed to every augmentation handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AugmentationConfig {
    /// Minimum confidence for a prediction or insight to be reported
    pub confidence_threshold: f64,
    /// Absolute z-score above which a value is flagged as an outlier
    pub anomaly_z_threshold: f64,
    /// Number of periods ahead a prediction looks
    pub prediction_horizon: u32,
    /// Upper bound on concurrent per-row handler calls within one job
    pub max_concurrent_row_jobs: usize,
    /// Artificial delay applied by the simulated handlers
    pub simulated_latency_ms: u64,
    /// Free-form parameters for caller-supplied handlers
    pub params: serde_json::Value,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            anomaly_z_threshold: 2.0,
            prediction_horizon: 1,
            max_concurrent_row_jobs: 8,
            simulated_latency_ms: 0,
            params: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub default_page_size: usize,
    /// Number of audit events retained in memory
    pub audit_capacity: usize,
    pub features: FeatureFlags,
    pub augmentation: AugmentationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_page_size: 25,
            audit_capacity: 200,
            features: FeatureFlags::default(),
            augmentation: AugmentationConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Failed to parse engine config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No engine config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read engine config from {:?}", path))?;
        Self::from_json_str(&content)
    }

    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not find config directory")?;
        Ok(config_dir.join("tabulon").join("engine.json"))
    }

    pub fn validate(&self) -> std::result::Result<(), EngineError> {
        if self.default_page_size == 0 {
            return Err(EngineError::InvalidPageSize(0));
        }
        if self.audit_capacity == 0 {
            return Err(EngineError::Config(
                "audit capacity must be at least 1".to_string(),
            ));
        }
        if self.augmentation.max_concurrent_row_jobs == 0 {
            return Err(EngineError::Config(
                "max concurrent row jobs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "defaultPageSize": 10, "features": { "nlq": false } }"#,
        )
        .unwrap();

        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.audit_capacity, 200);
        assert!(!config.features.nlq);
        assert!(config.features.insights);
        assert_eq!(config.augmentation, AugmentationConfig::default());
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "defaultPageSize": 0 }"#).unwrap_err();
        assert!(err.to_string().contains("Invalid page size"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(&dir.path().join("missing.json")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{ "auditCapacity": 5 }"#).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.audit_capacity, 5);
    }

    #[test]
    fn test_malformed_json_reports_context() {
        let err = EngineConfig::from_json_str("{ not json").unwrap_err();
        assert!(err.to_string().contains("Failed to parse engine config JSON"));
    }
}
