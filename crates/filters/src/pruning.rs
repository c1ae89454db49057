//! Quota-cell pruning from filter trees.
//!
//! A filter on a field group a cell is keyed on is decided by the cell's key
//! part, so it is satisfied exactly by the cells whose key part passes.
//! Constraints are derived bottom-up from the tree; any node that cannot be summarised safely
//! leaves its field groups unconstrained, so pruning only ever removes cells
//! that hold no matching respondent.

use crate::filter::{Filter, MetricFilter};
use quota_core::{FieldGroup, GroupedQuotaCells, QuotaCell};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Allowed key-part values per field group. A missing entry is unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellConstraint {
    allowed: BTreeMap<FieldGroup, BTreeSet<String>>,
}

impl CellConstraint {
    /// Admits every cell.
    pub fn unconstrained() -> Self {
        Self::default()
    }

    /// Restrict a single field group to `values`.
    pub fn single(field_group: impl Into<FieldGroup>, values: impl IntoIterator<Item = String>) -> Self {
        Self {
            allowed: BTreeMap::from([(field_group.into(), values.into_iter().collect())]),
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        self.allowed.is_empty()
    }

    /// Allowed values for `field_group`, or `None` if it is unconstrained.
    pub fn allowed(&self, field_group: &str) -> Option<&BTreeSet<String>> {
        self.allowed.get(field_group)
    }

    /// Constrained field groups.
    pub fn field_groups(&self) -> impl Iterator<Item = &str> {
        self.allowed.keys().map(String::as_str)
    }

    /// Whether `cell` may hold a matching respondent.
    ///
    /// Cells with no key part for a constrained group are admitted.
    pub fn admits(&self, cell: &QuotaCell) -> bool {
        self.allowed.iter().all(|(group, values)| match cell.key_part(group) {
            Some(value) => values.contains(value),
            None => true,
        })
    }

    /// Both constraints hold: groups merge, shared groups intersect.
    fn intersect(mut self, other: Self) -> Self {
        for (group, values) in other.allowed {
            match self.allowed.get_mut(&group) {
                Some(existing) => existing.retain(|v| values.contains(v)),
                None => {
                    self.allowed.insert(group, values);
                }
            }
        }
        self
    }

    /// Either constraint holds. Representable only when both restrict the same
    /// single field group.
    fn union(self, other: Self) -> Self {
        let (Some(mine), Some(theirs)) = (self.single_group(), other.single_group()) else {
            return Self::unconstrained();
        };
        if mine != theirs {
            return Self::unconstrained();
        }
        let mut allowed = self.allowed;
        for (group, values) in other.allowed {
            allowed.entry(group).or_default().extend(values);
        }
        Self { allowed }
    }

    fn single_group(&self) -> Option<&str> {
        match self.allowed.len() {
            1 => self.allowed.keys().next().map(String::as_str),
            _ => None,
        }
    }
}

/// Grouped quota cells with the weighting context needed to prune them.
#[derive(Debug, Clone)]
pub struct EnforcedFilteredGroupedQuotaCells {
    grouped: GroupedQuotaCells,
    /// Key-part values present in the grouping, per prunable field group.
    domain: BTreeMap<FieldGroup, BTreeSet<String>>,
}

impl EnforcedFilteredGroupedQuotaCells {
    /// Wrap `grouped` for pruning on the given field groups.
    ///
    /// Filters on any other field group never prune.
    pub fn create(grouped: GroupedQuotaCells, field_groups: impl IntoIterator<Item = impl Into<FieldGroup>>) -> Self {
        let mut domain: BTreeMap<FieldGroup, BTreeSet<String>> = field_groups
            .into_iter()
            .map(|group| (group.into(), BTreeSet::new()))
            .collect();
        for cell in &grouped {
            for (group, values) in domain.iter_mut() {
                if let Some(value) = cell.key_part(group) {
                    values.insert(value.to_string());
                }
            }
        }
        Self { grouped, domain }
    }

    /// Wrap `grouped` for pruning on every field group its cells are keyed on.
    pub fn from_grouping(grouped: GroupedQuotaCells) -> Self {
        let field_groups: BTreeSet<FieldGroup> = grouped
            .iter()
            .flat_map(|cell| cell.key_parts().keys().cloned())
            .collect();
        Self::create(grouped, field_groups)
    }

    /// The unpruned grouping.
    pub fn grouped(&self) -> &GroupedQuotaCells {
        &self.grouped
    }

    /// Field groups pruning may act on.
    pub fn field_groups(&self) -> impl Iterator<Item = &str> {
        self.domain.keys().map(String::as_str)
    }

    /// Cells that may hold a respondent matching `filter`, in grouping order.
    ///
    /// The unweighted cell is always kept.
    pub fn filter_unnecessary(&self, filter: &Filter) -> GroupedQuotaCells {
        let constraint = self.constraint_for(filter);
        if constraint.is_unconstrained() {
            debug!(cells = self.grouped.len(), "filter does not constrain quota cells");
            return self.grouped.clone();
        }

        let kept = self
            .grouped
            .filtered(|cell| cell.is_unweighted() || constraint.admits(cell));
        debug!(
            cells_in = self.grouped.len(),
            cells_out = kept.len(),
            constrained = ?constraint.field_groups().collect::<Vec<_>>(),
            "pruned quota cells"
        );
        kept
    }

    /// Constraint implied by `filter` within this weighting context.
    pub fn constraint_for(&self, filter: &Filter) -> CellConstraint {
        match filter {
            Filter::Metric(metric) => self.metric_constraint(metric),
            Filter::And(children) => children
                .iter()
                .map(|child| self.constraint_for(child))
                .fold(CellConstraint::unconstrained(), CellConstraint::intersect),
            Filter::Or(children) => {
                let mut constraints = children.iter().map(|child| self.constraint_for(child));
                match constraints.next() {
                    Some(first) => constraints.fold(first, CellConstraint::union),
                    None => CellConstraint::unconstrained(),
                }
            }
        }
    }

    fn metric_constraint(&self, metric: &MetricFilter) -> CellConstraint {
        let Some(domain) = self.domain.get(metric.field_group()) else {
            return CellConstraint::unconstrained();
        };
        if metric.invert || metric.primary_values.is_empty() {
            return CellConstraint::unconstrained();
        }

        let bounds = match (metric.treat_primary_values_as_range, metric.range_bounds()) {
            (false, _) => None,
            (true, Some(bounds)) => Some(bounds),
            (true, None) => return CellConstraint::unconstrained(),
        };
        let accepted = |v: i32| match bounds {
            Some((low, high)) => low <= v && v <= high,
            None => metric.primary_values.contains(&v),
        };

        // Key parts that are not integers can never equal a filter value
        let values = domain
            .iter()
            .filter(|value| value.parse::<i32>().is_ok_and(|v| accepted(v)))
            .cloned();
        CellConstraint::single(metric.field_group(), values)
    }
}
