//! Time-bounded respondent retrieval grouped by quota cell.

use crate::repository::RespondentRepository;
use chrono::NaiveDate;
use quota_core::{Error, GroupedQuotaCells, ProfileResponseEntity, QuotaCell, Result, Subset, TimeWindow};
use serde::Serialize;
use std::sync::Arc;

/// Respondents of one quota cell.
#[derive(Debug, Clone)]
pub struct CellResponseGroup<'a> {
    /// The cell the respondents belong to.
    pub quota_cell: Arc<QuotaCell>,
    /// Respondents, sorted by response date.
    pub profiles: &'a [ProfileResponseEntity],
}

impl<'a> CellResponseGroup<'a> {
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Narrow to respondents answering between `start` and `end`, both inclusive.
    fn within(&self, start: NaiveDate, end: NaiveDate) -> Self {
        let all: &'a [ProfileResponseEntity] = self.profiles;
        let lo = all.partition_point(|r| r.response_date < start);
        let hi = all.partition_point(|r| r.response_date <= end);
        let profiles: &'a [ProfileResponseEntity] = if lo < hi { &all[lo..hi] } else { &[] };
        Self {
            quota_cell: Arc::clone(&self.quota_cell),
            profiles,
        }
    }
}

/// Sample size of one quota cell within a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellSampleSize {
    pub quota_cell_id: i32,
    /// Display form of the cell's key parts.
    pub quota_cell: String,
    pub sample_size: usize,
}

/// Cell-grouped respondents, not yet restricted to a time window.
#[derive(Debug, Clone, Default)]
pub struct CellResponses<'a> {
    groups: Vec<CellResponseGroup<'a>>,
}

impl<'a> CellResponses<'a> {
    /// Restrict every group to `start <= date <= end`.
    ///
    /// Groups left with no respondents are dropped, so a window with no
    /// matching data yields an empty vector.
    pub fn within_times_inclusive(&self, start: NaiveDate, end: NaiveDate) -> Vec<CellResponseGroup<'a>> {
        self.groups
            .iter()
            .map(|group| group.within(start, end))
            .filter(|group| !group.is_empty())
            .collect()
    }

    /// [`within_times_inclusive`](Self::within_times_inclusive) over a [`TimeWindow`].
    pub fn within_window(&self, window: &TimeWindow) -> Vec<CellResponseGroup<'a>> {
        self.within_times_inclusive(window.start, window.end)
    }

    /// All groups, regardless of date.
    pub fn groups(&self) -> &[CellResponseGroup<'a>] {
        &self.groups
    }

    /// Total respondents across all groups.
    pub fn total(&self) -> usize {
        self.groups.iter().map(CellResponseGroup::len).sum()
    }
}

/// Read-only view of a repository, checked against the expected subset.
#[derive(Debug, Clone, Copy)]
pub struct ProfileResponseAccessor<'a> {
    repository: &'a RespondentRepository,
}

impl<'a> ProfileResponseAccessor<'a> {
    /// Create an accessor; fails if `repository` holds another subset.
    pub fn new(repository: &'a RespondentRepository, subset: &Subset) -> Result<Self> {
        if repository.subset() != subset {
            return Err(Error::subset_mismatch(&subset.id, &repository.subset().id));
        }
        Ok(Self { repository })
    }

    pub fn repository(&self) -> &'a RespondentRepository {
        self.repository
    }

    /// One group per desired cell that holds respondents, in the desired order.
    ///
    /// Cells the repository does not know are skipped.
    pub fn get_responses(&self, desired: &GroupedQuotaCells) -> CellResponses<'a> {
        let groups = desired
            .iter()
            .filter_map(|cell| {
                let profiles = self.repository.respondents_in(cell);
                (!profiles.is_empty()).then(|| CellResponseGroup {
                    quota_cell: Arc::clone(cell),
                    profiles,
                })
            })
            .collect();
        CellResponses { groups }
    }

    /// Per-cell respondent counts within `window`, including empty cells.
    pub fn sample_sizes(&self, cells: &GroupedQuotaCells, window: &TimeWindow) -> Vec<CellSampleSize> {
        cells
            .iter()
            .map(|cell| {
                let all = CellResponseGroup {
                    quota_cell: Arc::clone(cell),
                    profiles: self.repository.respondents_in(cell),
                };
                CellSampleSize {
                    quota_cell_id: cell.id(),
                    quota_cell: cell.to_string(),
                    sample_size: all.within(window.start, window.end).len(),
                }
            })
            .collect()
    }
}
