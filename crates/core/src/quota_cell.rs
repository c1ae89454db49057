//! Quota cells and their groupings.
//!
//! A quota cell is one combination of field-group values (e.g. Gender=0,
//! Region=3) and is the unit respondents are weighted by. Cells are immutable
//! and shared as `Arc<QuotaCell>`; groupings are immutable ordered snapshots.

use crate::types::{FieldGroup, Subset};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Id given to the reserved cell holding respondents that are not weighted.
pub const UNWEIGHTED_CELL_ID: i32 = -1;

/// One discrete combination of field-group values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuotaCell {
    id: i32,
    index: usize,
    subset: Subset,
    key_parts: BTreeMap<FieldGroup, String>,
}

impl QuotaCell {
    /// Create a cell. `index` is the dense ordinal used as a weight-vector offset.
    pub fn new(id: i32, index: usize, subset: Subset, key_parts: BTreeMap<FieldGroup, String>) -> Self {
        Self {
            id,
            index,
            subset,
            key_parts,
        }
    }

    /// The reserved cell with no key parts, used for unweighted computation.
    pub fn unweighted(subset: Subset) -> Self {
        Self::new(UNWEIGHTED_CELL_ID, 0, subset, BTreeMap::new())
    }

    #[inline]
    pub fn id(&self) -> i32 {
        self.id
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn subset(&self) -> &Subset {
        &self.subset
    }

    /// Field group → value mapping for this cell.
    #[inline]
    pub fn key_parts(&self) -> &BTreeMap<FieldGroup, String> {
        &self.key_parts
    }

    /// Value of this cell for `field_group`, if the cell is split on it.
    #[inline]
    pub fn key_part(&self, field_group: &str) -> Option<&str> {
        self.key_parts.get(field_group).map(String::as_str)
    }

    /// Whether this is the reserved unweighted cell.
    #[inline]
    pub fn is_unweighted(&self) -> bool {
        self.key_parts.is_empty()
    }
}

impl fmt::Display for QuotaCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unweighted() {
            return f.write_str("Unweighted");
        }
        let mut first = true;
        for (group, value) in &self.key_parts {
            if !first {
                f.write_str("|")?;
            }
            write!(f, "{group}:{value}")?;
            first = false;
        }
        Ok(())
    }
}

/// Allocates quota cells for a subset.
///
/// Index 0 is always the unweighted cell. Every other key-part combination is
/// created once, on first request, with the next free index; repeat requests
/// return the same cell.
#[derive(Debug, Clone)]
pub struct QuotaCellFactory {
    subset: Subset,
    cells: Vec<Arc<QuotaCell>>,
    by_key: HashMap<BTreeMap<FieldGroup, String>, Arc<QuotaCell>>,
}

impl QuotaCellFactory {
    /// Create a factory holding only the unweighted cell.
    pub fn new(subset: Subset) -> Self {
        let unweighted = Arc::new(QuotaCell::unweighted(subset.clone()));
        Self {
            subset,
            cells: vec![unweighted],
            by_key: HashMap::new(),
        }
    }

    pub fn subset(&self) -> &Subset {
        &self.subset
    }

    /// The reserved unweighted cell.
    pub fn unweighted_cell(&self) -> &Arc<QuotaCell> {
        &self.cells[0]
    }

    /// Get the cell for a key-part combination, creating it if needed.
    ///
    /// An empty combination maps to the unweighted cell.
    pub fn get_or_create(&mut self, key_parts: BTreeMap<FieldGroup, String>) -> Arc<QuotaCell> {
        if key_parts.is_empty() {
            return Arc::clone(self.unweighted_cell());
        }
        if let Some(existing) = self.by_key.get(&key_parts) {
            return Arc::clone(existing);
        }

        let index = self.cells.len();
        let cell = Arc::new(QuotaCell::new(
            index as i32 - 1,
            index,
            self.subset.clone(),
            key_parts.clone(),
        ));
        debug!(subset = %self.subset, cell = %cell, index, "created quota cell");
        self.cells.push(Arc::clone(&cell));
        self.by_key.insert(key_parts, Arc::clone(&cell));
        cell
    }

    /// Cell already created for `key_parts`, if any.
    pub fn get(&self, key_parts: &BTreeMap<FieldGroup, String>) -> Option<&Arc<QuotaCell>> {
        if key_parts.is_empty() {
            return Some(self.unweighted_cell());
        }
        self.by_key.get(key_parts)
    }

    /// Index of the factory's cell matching `cell`.
    ///
    /// Cells built elsewhere resolve by their key parts.
    pub fn index_of(&self, cell: &QuotaCell) -> Option<usize> {
        if cell.subset() != &self.subset {
            return None;
        }
        if self.contains(cell) {
            return Some(cell.index());
        }
        self.get(cell.key_parts()).map(|known| known.index())
    }

    /// Whether `cell` is one this factory handed out.
    pub fn contains(&self, cell: &QuotaCell) -> bool {
        self.cells
            .get(cell.index())
            .is_some_and(|known| known.as_ref() == cell)
    }

    /// All cells in index order, unweighted cell first.
    pub fn all_cells(&self) -> &[Arc<QuotaCell>] {
        &self.cells
    }

    /// All cells except the unweighted one, in index order.
    pub fn weighted_cells(&self) -> &[Arc<QuotaCell>] {
        &self.cells[1..]
    }

    /// Number of cells including the unweighted cell.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Always false: the unweighted cell is present from construction.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Immutable ordered collection of quota cells.
///
/// Derived collections are new instances; the cells themselves are shared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedQuotaCells {
    cells: Vec<Arc<QuotaCell>>,
}

impl GroupedQuotaCells {
    /// Group the given cells as-is, keeping their order.
    pub fn create_unfiltered(cells: impl IntoIterator<Item = Arc<QuotaCell>>) -> Self {
        Self {
            cells: cells.into_iter().collect(),
        }
    }

    pub fn cells(&self) -> &[Arc<QuotaCell>] {
        &self.cells
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<QuotaCell>> {
        self.cells.iter()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, cell: &QuotaCell) -> bool {
        self.cells.iter().any(|c| c.as_ref() == cell)
    }

    /// Length a weight vector needs to be addressable by every cell's index.
    pub fn index_capacity(&self) -> usize {
        self.cells.iter().map(|c| c.index() + 1).max().unwrap_or(0)
    }

    /// New grouping holding the cells that satisfy `keep`, order preserved.
    pub fn filtered(&self, mut keep: impl FnMut(&QuotaCell) -> bool) -> Self {
        Self {
            cells: self.cells.iter().filter(|c| keep(c)).cloned().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a GroupedQuotaCells {
    type Item = &'a Arc<QuotaCell>;
    type IntoIter = std::slice::Iter<'a, Arc<QuotaCell>>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.iter()
    }
}
