//! Quota-cell weighting and weighted aggregation.
//!
//! This crate handles:
//! - Target share distributions per quota cell
//! - Cell weights from target and observed shares
//! - Filtered, pruned, weighted aggregation of respondents

pub mod aggregator;
pub mod result;
pub mod targets;
pub mod weights;

pub use aggregator::{AggregationRequest, WeightedAggregator};
pub use result::{CellResult, WeightedResult};
pub use targets::{CellTarget, TargetDistribution};
pub use weights::QuotaCellWeights;
