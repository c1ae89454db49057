//! Filters and quota-cell pruning for the quota engine.
//!
//! This crate handles:
//! - Integer bucket generation for numeric answers
//! - Boolean filter trees evaluated per respondent
//! - Pruning grouped quota cells that cannot satisfy a filter

pub mod buckets;
pub mod filter;
pub mod pruning;

pub use buckets::{
    create_buckets, create_buckets_for_age, create_buckets_for_number_of_children, BucketOperator,
    IntegerInclusiveBucket,
};
pub use filter::{Filter, Measure, MetricFilter};
pub use pruning::{CellConstraint, EnforcedFilteredGroupedQuotaCells};
