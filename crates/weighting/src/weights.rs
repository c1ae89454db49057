//! Per-cell weights from target and observed shares.

use crate::targets::TargetDistribution;
use quota_core::{Error, GroupedQuotaCells, QuotaCell, Result, TimeWindow};
use quota_respondents::ProfileResponseAccessor;
use tracing::{debug, warn};

/// Weight of every quota cell, addressed by [`QuotaCell::index`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuotaCellWeights {
    weights: Vec<f64>,
}

impl QuotaCellWeights {
    /// Every cell in `grouping` weighs 1.
    pub fn unweighted(grouping: &GroupedQuotaCells) -> Self {
        Self {
            weights: vec![1.0; grouping.index_capacity()],
        }
    }

    /// Weight each cell by target share over observed share within `window`.
    ///
    /// Observed shares are taken across the whole of `grouping`, which must be
    /// the full weighted grouping rather than a pruned one. Cells with no
    /// observed respondents or no target weigh 0.
    pub fn calculate(
        accessor: &ProfileResponseAccessor<'_>,
        grouping: &GroupedQuotaCells,
        targets: &TargetDistribution,
        window: &TimeWindow,
    ) -> Result<Self> {
        let subset = accessor.repository().subset();
        if &targets.subset != subset {
            return Err(Error::subset_mismatch(&subset.id, &targets.subset.id));
        }

        let sample_sizes = accessor.sample_sizes(grouping, window);
        let total: usize = sample_sizes.iter().map(|s| s.sample_size).sum();
        let mut weights = vec![0.0; grouping.index_capacity()];

        if total == 0 {
            warn!(
                subset = %subset,
                cells = grouping.len(),
                start = %window.start,
                end = %window.end,
                "no respondents in weighted cells, weighting all cells to zero"
            );
            return Ok(Self { weights });
        }

        for (cell, size) in grouping.iter().zip(&sample_sizes) {
            let Some(target) = targets.target_for(cell) else {
                warn!(subset = %subset, cell = %cell, "no weighting target for quota cell");
                continue;
            };
            if size.sample_size == 0 {
                debug!(subset = %subset, cell = %cell, target_share = target, "no observed respondents for quota cell");
                continue;
            }
            let observed = size.sample_size as f64 / total as f64;
            weights[cell.index()] = target / observed;
        }

        debug!(subset = %subset, cells = grouping.len(), respondents = total, "calculated quota cell weights");
        Ok(Self { weights })
    }

    /// Weight for `cell`; cells outside the weighted grouping weigh 0.
    #[inline]
    pub fn weight_for(&self, cell: &QuotaCell) -> f64 {
        self.weights.get(cell.index()).copied().unwrap_or(0.0)
    }

    /// Weights in cell-index order.
    pub fn as_slice(&self) -> &[f64] {
        &self.weights
    }
}
