//! Weighted aggregation results.

use quota_core::{ProfileResponseEntity, QuotaCell};
use serde::Serialize;

/// Contribution of one quota cell to a weighted result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellResult {
    pub quota_cell_id: i32,
    /// Display form of the cell's key parts.
    pub quota_cell: String,
    pub weight: f64,
    /// Matching respondents.
    pub unweighted_sample_size: usize,
    /// Matching respondents times the cell weight.
    pub weighted_sample_size: f64,
    /// Weighted sum of measure answers.
    pub weighted_total: f64,
    /// Weighted count of matching respondents who answered the measure.
    pub weighted_base: f64,
}

impl CellResult {
    pub fn new(cell: &QuotaCell, weight: f64) -> Self {
        Self {
            quota_cell_id: cell.id(),
            quota_cell: cell.to_string(),
            weight,
            unweighted_sample_size: 0,
            weighted_sample_size: 0.0,
            weighted_total: 0.0,
            weighted_base: 0.0,
        }
    }

    /// Count a matching respondent, and its answer to `measure` if any.
    pub fn add(&mut self, respondent: &ProfileResponseEntity, measure: Option<&str>) {
        self.unweighted_sample_size += 1;
        self.weighted_sample_size += self.weight;
        if let Some(value) = measure.and_then(|m| respondent.answer(m)) {
            self.weighted_total += self.weight * f64::from(value);
            self.weighted_base += self.weight;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.unweighted_sample_size == 0
    }
}

/// Totals over every quota cell holding matching respondents.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeightedResult {
    /// Matching respondents.
    pub unweighted_sample_size: usize,
    /// Sum of matching respondents' weights.
    pub weighted_sample_size: f64,
    /// Weighted mean of the measure; `None` without a measure or a positive weighted base.
    pub weighted_mean: Option<f64>,
    /// Per-cell contributions, in grouping order.
    pub cells: Vec<CellResult>,
    /// Cells in the grouping before pruning.
    pub cells_considered: usize,
    /// Cells removed by pruning.
    pub cells_pruned: usize,
}

impl WeightedResult {
    /// No respondents were examined.
    pub fn empty(cells_considered: usize) -> Self {
        Self {
            cells_considered,
            ..Self::default()
        }
    }

    /// Sum cell contributions.
    pub fn from_cells(cells: Vec<CellResult>, cells_considered: usize, cells_pruned: usize) -> Self {
        let mut result = Self {
            cells_considered,
            cells_pruned,
            ..Self::default()
        };

        let mut weighted_total = 0.0;
        let mut weighted_base = 0.0;
        for cell in &cells {
            result.unweighted_sample_size += cell.unweighted_sample_size;
            result.weighted_sample_size += cell.weighted_sample_size;
            weighted_total += cell.weighted_total;
            weighted_base += cell.weighted_base;
        }

        result.weighted_mean = if weighted_base > 0.0 {
            Some(weighted_total / weighted_base)
        } else {
            None
        };
        result.cells = cells;
        result
    }
}
