//! Core types and configuration for the quota engine.
//!
//! This crate provides the shared data model used across all other crates:
//! - Subsets, respondents and time windows
//! - Quota cells, the cell factory and cell groupings
//! - Average descriptors and weighting methods
//! - Configuration structures
//! - Common error types

pub mod averages;
pub mod config;
pub mod error;
pub mod quota_cell;
pub mod types;

pub use averages::{fallback_averages, AverageDescriptor, PeriodUnit};
pub use config::{Config, PruningConfig, WeightingConfig};
pub use error::{Error, Result};
pub use quota_cell::{GroupedQuotaCells, QuotaCell, QuotaCellFactory, UNWEIGHTED_CELL_ID};
pub use types::*;
