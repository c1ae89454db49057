//! Respondent storage for a single subset.
//!
//! Respondents are stored per quota cell, kept sorted by response date so
//! time-window queries are two binary searches. The repository is filled once
//! at load time and only read afterwards.

use chrono::NaiveDate;
use quota_core::{
    AverageDescriptor, Error, FieldGroup, GroupedQuotaCells, ProfileResponseEntity, QuotaCell,
    QuotaCellFactory, Result, Subset,
};
use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// Append-only store of respondents tagged by quota cell.
#[derive(Debug, Clone)]
pub struct RespondentRepository {
    subset: Subset,
    factory: QuotaCellFactory,
    /// Respondents per cell index, sorted by response date.
    by_cell: Vec<Vec<ProfileResponseEntity>>,
    count: usize,
    earliest: Option<NaiveDate>,
    latest: Option<NaiveDate>,
}

impl RespondentRepository {
    /// Create an empty repository for `subset`.
    pub fn new(subset: Subset) -> Self {
        Self {
            factory: QuotaCellFactory::new(subset.clone()),
            subset,
            by_cell: Vec::new(),
            count: 0,
            earliest: None,
            latest: None,
        }
    }

    pub fn subset(&self) -> &Subset {
        &self.subset
    }

    /// Number of respondents added so far.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Get or allocate the cell for a key-part combination.
    pub fn quota_cell(&mut self, key_parts: BTreeMap<FieldGroup, String>) -> Arc<QuotaCell> {
        self.factory.get_or_create(key_parts)
    }

    /// The reserved cell for respondents that are not weighted.
    pub fn unweighted_cell(&self) -> &Arc<QuotaCell> {
        self.factory.unweighted_cell()
    }

    /// Whether the repository has a cell with `cell`'s key parts.
    pub fn knows_cell(&self, cell: &QuotaCell) -> bool {
        self.factory.index_of(cell).is_some()
    }

    /// Store a respondent in `cell`.
    ///
    /// `cell` may be one of this repository's cells or one built elsewhere;
    /// the latter is interned by its key parts, so each combination stays a
    /// single cell. Fails if the cell belongs to another subset.
    ///
    /// Returns the id the repository assigns to the respondent: its load
    /// position, equal to [`count`](Self::count) before the call. `entity.id`
    /// keeps the source's own identifier.
    ///
    /// A respondent dated on or after the cell's latest is appended; an earlier
    /// one is inserted in date order. Loads in arbitrary order should go through
    /// [`add_all`](Self::add_all), which sorts once.
    pub fn add(&mut self, entity: ProfileResponseEntity, cell: &QuotaCell) -> Result<usize> {
        let index = self.index_for(cell)?;
        let date = entity.response_date;
        let respondents = self.storage_mut(index);
        if respondents.last().map_or(true, |last| last.response_date <= date) {
            respondents.push(entity);
        } else {
            // Insert after any equal dates so same-day respondents keep insertion order
            let at = respondents.partition_point(|r| r.response_date <= date);
            respondents.insert(at, entity);
        }
        Ok(self.record(date))
    }

    /// Store many respondents, then sort each touched cell once by date.
    ///
    /// Same-day respondents keep load order. Stops at the first cell from
    /// another subset; respondents stored before it stay stored. Returns the
    /// number stored.
    pub fn add_all<C: Borrow<QuotaCell>>(
        &mut self,
        respondents: impl IntoIterator<Item = (ProfileResponseEntity, C)>,
    ) -> Result<usize> {
        let mut touched = BTreeSet::new();
        let mut added = 0;
        let mut outcome = Ok(());

        for (entity, cell) in respondents {
            let index = match self.index_for(cell.borrow()) {
                Ok(index) => index,
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            };
            let date = entity.response_date;
            self.storage_mut(index).push(entity);
            self.record(date);
            touched.insert(index);
            added += 1;
        }

        for index in &touched {
            self.by_cell[*index].sort_by_key(|r| r.response_date);
        }
        debug!(subset = %self.subset, added, cells = touched.len(), "loaded respondents");
        outcome.map(|()| added)
    }

    /// Allocate (or reuse) the cell for `key_parts` and store the respondent there.
    pub fn add_with_key_parts(
        &mut self,
        entity: ProfileResponseEntity,
        key_parts: BTreeMap<FieldGroup, String>,
    ) -> Result<usize> {
        let cell = self.quota_cell(key_parts);
        self.add(entity, &cell)
    }

    /// Respondents stored in `cell`, sorted by response date.
    pub fn respondents_in(&self, cell: &QuotaCell) -> &[ProfileResponseEntity] {
        self.factory
            .index_of(cell)
            .and_then(|index| self.by_cell.get(index))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn index_for(&mut self, cell: &QuotaCell) -> Result<usize> {
        if cell.subset() != &self.subset {
            return Err(Error::subset_mismatch(&self.subset.id, &cell.subset().id));
        }
        match self.factory.index_of(cell) {
            Some(index) => Ok(index),
            None => Ok(self.factory.get_or_create(cell.key_parts().clone()).index()),
        }
    }

    fn storage_mut(&mut self, index: usize) -> &mut Vec<ProfileResponseEntity> {
        if self.by_cell.len() <= index {
            self.by_cell.resize_with(index + 1, Vec::new);
        }
        &mut self.by_cell[index]
    }

    /// Count one stored respondent; returns its load position.
    fn record(&mut self, date: NaiveDate) -> usize {
        self.earliest = Some(self.earliest.map_or(date, |d| d.min(date)));
        self.latest = Some(self.latest.map_or(date, |d| d.max(date)));
        let position = self.count;
        self.count += 1;
        position
    }

    /// Cells used by a computation under `average`.
    ///
    /// Weighted averages see only the weighted cells. Unweighted averages also
    /// see the reserved unweighted cell, which comes first.
    pub fn grouped_quota_cells(&self, average: &AverageDescriptor) -> GroupedQuotaCells {
        let grouped = if average.weighting_method.is_weighted() {
            self.weighted_cells_group()
        } else {
            self.all_cells_group()
        };
        debug!(
            subset = %self.subset,
            average = %average.average_id,
            cells = grouped.len(),
            "grouped quota cells"
        );
        grouped
    }

    /// Every weighted cell, in index order.
    pub fn weighted_cells_group(&self) -> GroupedQuotaCells {
        GroupedQuotaCells::create_unfiltered(self.factory.weighted_cells().iter().cloned())
    }

    /// The unweighted cell followed by every weighted cell.
    pub fn all_cells_group(&self) -> GroupedQuotaCells {
        GroupedQuotaCells::create_unfiltered(self.factory.all_cells().iter().cloned())
    }

    /// Date of the earliest stored response.
    pub fn earliest_response_date(&self) -> Option<NaiveDate> {
        self.earliest
    }

    /// Date of the latest stored response.
    pub fn latest_response_date(&self) -> Option<NaiveDate> {
        self.latest
    }
}
