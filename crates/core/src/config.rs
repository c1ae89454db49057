//! Configuration structures for the quota engine.

use crate::averages::{fallback_averages, AverageDescriptor};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration for the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Quota cell pruning configuration.
    #[serde(default)]
    pub pruning: PruningConfig,
    /// Quota cell weighting configuration.
    #[serde(default)]
    pub weighting: WeightingConfig,
    /// Known averaging contexts.
    #[serde(default = "fallback_averages")]
    pub averages: Vec<AverageDescriptor>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pruning: PruningConfig::default(),
            weighting: WeightingConfig::default(),
            averages: fallback_averages(),
        }
    }
}

impl Config {
    /// Parse a configuration from JSON. Missing sections take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Look up an average by id.
    pub fn average(&self, average_id: &str) -> Option<&AverageDescriptor> {
        self.averages.iter().find(|a| a.average_id == average_id)
    }
}

/// Quota cell pruning configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruningConfig {
    /// Drop quota cells a filter provably excludes before retrieval.
    pub enabled: bool,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Quota cell weighting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightingConfig {
    /// Allowed distance of the target total from 1 when targets are not normalized.
    pub target_sum_tolerance: f64,
    /// Rescale targets so they sum to 1.
    pub normalize_targets: bool,
}

impl Default for WeightingConfig {
    fn default() -> Self {
        Self {
            target_sum_tolerance: 1e-6,
            normalize_targets: true,
        }
    }
}
