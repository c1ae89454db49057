//! Core data types for the quota engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name of a field group (a categorical question used for grouping, e.g. "Gender").
pub type FieldGroup = String;

/// A top-level data partition, typically a market or country.
///
/// Quota cells, respondents and filters all belong to exactly one subset.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Subset {
    /// Subset identifier (e.g., "UK").
    pub id: String,
}

impl Subset {
    /// Create a subset from its identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl fmt::Display for Subset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// How respondent contributions are scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeightingMethod {
    /// Every respondent counts equally.
    None,
    /// Respondents are scaled by target share / observed share of their quota cell.
    QuotaCell,
}

impl WeightingMethod {
    /// Whether respondents are redistributed across quota cells.
    #[inline]
    pub fn is_weighted(self) -> bool {
        matches!(self, WeightingMethod::QuotaCell)
    }
}

/// Inclusive date range. Both `start` and `end` are part of the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    /// First included date.
    pub start: NaiveDate,
    /// Last included date.
    pub end: NaiveDate,
}

impl TimeWindow {
    /// Create a window, swapping the bounds if they arrive reversed.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if end < start {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    /// Window covering a single day.
    pub fn single_day(date: NaiveDate) -> Self {
        Self { start: date, end: date }
    }

    /// Whether `date` lies within the window (both bounds inclusive).
    #[inline]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of days covered, counting both ends.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// A single respondent record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileResponseEntity {
    /// Respondent id.
    pub id: i64,
    /// Response date (date-only granularity).
    pub response_date: NaiveDate,
    /// Survey the response came from.
    pub survey_id: i32,
    /// Answer payload keyed by field name.
    #[serde(default)]
    pub answers: BTreeMap<String, i32>,
}

impl ProfileResponseEntity {
    /// Create a respondent with no answers.
    pub fn new(id: i64, response_date: NaiveDate, survey_id: i32) -> Self {
        Self {
            id,
            response_date,
            survey_id,
            answers: BTreeMap::new(),
        }
    }

    /// Builder-style helper to attach an answer.
    pub fn with_answer(mut self, field: impl Into<String>, value: i32) -> Self {
        self.answers.insert(field.into(), value);
        self
    }

    /// Answer for a field, if given.
    #[inline]
    pub fn answer(&self, field: &str) -> Option<i32> {
        self.answers.get(field).copied()
    }
}
