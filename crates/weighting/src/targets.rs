//! Target population shares per quota cell.

use quota_core::{Error, FieldGroup, QuotaCell, Result, Subset, WeightingConfig};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Desired share of the population for one key-part combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellTarget {
    pub key_parts: BTreeMap<FieldGroup, String>,
    pub target: f64,
}

impl CellTarget {
    pub fn new(key_parts: BTreeMap<FieldGroup, String>, target: f64) -> Self {
        Self { key_parts, target }
    }
}

/// Target shares for the weighted cells of one subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetDistribution {
    pub subset: Subset,
    pub targets: Vec<CellTarget>,
}

impl TargetDistribution {
    pub fn new(subset: Subset, targets: Vec<CellTarget>) -> Self {
        Self { subset, targets }
    }

    /// Parse a distribution from JSON. The result is not yet validated.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check the targets and bring them to shares summing to 1.
    ///
    /// Targets must be finite, non-negative, unique per key-part combination
    /// and have a positive total. With `normalize_targets` they are rescaled;
    /// otherwise the total must already be within `target_sum_tolerance` of 1.
    pub fn validate_and_normalize(mut self, config: &WeightingConfig) -> Result<Self> {
        if self.targets.is_empty() {
            return Err(Error::config(format!("no weighting targets for subset {}", self.subset)));
        }

        let mut seen = BTreeSet::new();
        for target in &self.targets {
            if !target.target.is_finite() || target.target < 0.0 {
                return Err(Error::config(format!(
                    "invalid target {} for {:?} in subset {}",
                    target.target, target.key_parts, self.subset
                )));
            }
            if !seen.insert(&target.key_parts) {
                return Err(Error::config(format!(
                    "duplicate target for {:?} in subset {}",
                    target.key_parts, self.subset
                )));
            }
        }

        let total = self.total();
        if total <= 0.0 {
            return Err(Error::config(format!("weighting targets for subset {} sum to zero", self.subset)));
        }

        if config.normalize_targets {
            for target in &mut self.targets {
                target.target /= total;
            }
        } else if (total - 1.0).abs() > config.target_sum_tolerance {
            return Err(Error::config(format!(
                "weighting targets for subset {} sum to {total}, expected 1 (tolerance {})",
                self.subset, config.target_sum_tolerance
            )));
        }

        Ok(self)
    }

    /// Sum of all targets.
    pub fn total(&self) -> f64 {
        self.targets.iter().map(|t| t.target).sum()
    }

    /// Field groups the targets are keyed by.
    pub fn field_groups(&self) -> BTreeSet<&str> {
        self.targets
            .iter()
            .flat_map(|t| t.key_parts.keys().map(String::as_str))
            .collect()
    }

    /// Target for the cell with exactly `cell`'s key parts.
    pub fn target_for(&self, cell: &QuotaCell) -> Option<f64> {
        self.targets
            .iter()
            .find(|t| &t.key_parts == cell.key_parts())
            .map(|t| t.target)
    }
}
