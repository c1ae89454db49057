//! Boolean filter trees over measure membership tests.

use quota_core::{FieldGroup, ProfileResponseEntity, QuotaCell};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A survey question usable for grouping or filtering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Measure {
    /// Measure name.
    pub name: String,
    /// Field group the measure reads; also the answer field on respondents.
    pub field_group: FieldGroup,
}

impl Measure {
    pub fn new(name: impl Into<String>, field_group: impl Into<FieldGroup>) -> Self {
        Self {
            name: name.into(),
            field_group: field_group.into(),
        }
    }

    /// Measure named after the field group it reads.
    pub fn for_field_group(field_group: impl Into<FieldGroup>) -> Self {
        let field_group = field_group.into();
        Self::new(field_group.clone(), field_group)
    }
}

/// Membership test on a single measure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricFilter {
    pub measure: Measure,
    /// Accepted values, or `[low, high]` when `treat_primary_values_as_range` is set.
    pub primary_values: Vec<i32>,
    /// Accept exactly the values the test would otherwise reject.
    #[serde(default)]
    pub invert: bool,
    #[serde(default)]
    pub treat_primary_values_as_range: bool,
}

impl MetricFilter {
    /// Accept any of `values`.
    pub fn discrete(measure: Measure, values: impl IntoIterator<Item = i32>) -> Self {
        Self {
            measure,
            primary_values: values.into_iter().collect(),
            invert: false,
            treat_primary_values_as_range: false,
        }
    }

    /// Accept `low..=high`.
    pub fn range(measure: Measure, low: i32, high: i32) -> Self {
        Self {
            measure,
            primary_values: vec![low, high],
            invert: false,
            treat_primary_values_as_range: true,
        }
    }

    /// The same test, negated.
    pub fn inverted(mut self) -> Self {
        self.invert = !self.invert;
        self
    }

    pub fn field_group(&self) -> &str {
        &self.measure.field_group
    }

    /// Inclusive bounds of a range test, taken from the first two values.
    pub fn range_bounds(&self) -> Option<(i32, i32)> {
        match self.primary_values.as_slice() {
            [a, b, ..] => Some((*a.min(b), *a.max(b))),
            _ => None,
        }
    }

    /// Test a value, ignoring `invert`.
    fn accepts(&self, value: i32) -> bool {
        if self.treat_primary_values_as_range {
            match self.primary_values.as_slice() {
                [] => false,
                [only] => value == *only,
                _ => self
                    .range_bounds()
                    .is_some_and(|(low, high)| low <= value && value <= high),
            }
        } else {
            self.primary_values.contains(&value)
        }
    }

    /// Whether a respondent in `cell` passes.
    ///
    /// A field group the cell is keyed on is read from the cell's key part, so
    /// every respondent of a cell agrees on it. Other field groups are read from
    /// the respondent's answers. A missing or non-integer value fails the
    /// un-inverted test.
    pub fn matches(&self, respondent: &ProfileResponseEntity, cell: &QuotaCell) -> bool {
        let field_group = self.field_group();
        let value = match cell.key_part(field_group) {
            Some(key_part) => key_part.parse().ok(),
            None => respondent.answer(field_group),
        };
        let accepted = value.is_some_and(|v| self.accepts(v));
        accepted != self.invert
    }
}

/// Filter tree. Closed set of variants; every consumer matches exhaustively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter {
    Metric(MetricFilter),
    /// Satisfied when every child is. No children: always satisfied.
    And(Vec<Filter>),
    /// Satisfied when any child is. No children: always satisfied.
    Or(Vec<Filter>),
}

impl Filter {
    pub fn metric(filter: MetricFilter) -> Self {
        Filter::Metric(filter)
    }

    pub fn and(children: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(children.into_iter().collect())
    }

    pub fn or(children: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(children.into_iter().collect())
    }

    /// Whether a respondent in `cell` satisfies the tree.
    pub fn matches(&self, respondent: &ProfileResponseEntity, cell: &QuotaCell) -> bool {
        match self {
            Filter::Metric(metric) => metric.matches(respondent, cell),
            Filter::And(children) => children.iter().all(|c| c.matches(respondent, cell)),
            Filter::Or(children) => children.is_empty() || children.iter().any(|c| c.matches(respondent, cell)),
        }
    }

    /// Every field group a metric anywhere in the tree reads.
    pub fn referenced_field_groups(&self) -> BTreeSet<&str> {
        let mut groups = BTreeSet::new();
        self.collect_field_groups(&mut groups);
        groups
    }

    fn collect_field_groups<'a>(&'a self, groups: &mut BTreeSet<&'a str>) {
        match self {
            Filter::Metric(metric) => {
                groups.insert(metric.field_group());
            }
            Filter::And(children) | Filter::Or(children) => {
                for child in children {
                    child.collect_field_groups(groups);
                }
            }
        }
    }
}

impl From<MetricFilter> for Filter {
    fn from(metric: MetricFilter) -> Self {
        Filter::Metric(metric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use quota_core::{QuotaCellFactory, Subset};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn gender() -> Measure {
        Measure::for_field_group("Gender")
    }

    fn age() -> Measure {
        Measure::for_field_group("Age")
    }

    fn cell(gender: &str) -> Arc<QuotaCell> {
        let mut factory = QuotaCellFactory::new(Subset::new("UK"));
        factory.get_or_create(BTreeMap::from([("Gender".to_string(), gender.to_string())]))
    }

    fn respondent() -> ProfileResponseEntity {
        ProfileResponseEntity::new(1, NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(), -1)
    }

    #[test]
    fn test_discrete_uses_cell_key_part() {
        let filter = Filter::metric(MetricFilter::discrete(gender(), [0]));
        assert!(filter.matches(&respondent(), &cell("0")));
        assert!(!filter.matches(&respondent(), &cell("1")));
    }

    #[test]
    fn test_cell_key_part_overrides_disagreeing_answer() {
        let filter = Filter::metric(MetricFilter::discrete(gender(), [1]));
        assert!(!filter.matches(&respondent().with_answer("Gender", 1), &cell("0")));
        assert!(filter.matches(&respondent().with_answer("Gender", 0), &cell("1")));
    }

    #[test]
    fn test_answer_used_when_cell_not_keyed_on_group() {
        let filter = Filter::metric(MetricFilter::discrete(gender(), [1]));
        let unweighted = QuotaCell::unweighted(Subset::new("UK"));
        assert!(filter.matches(&respondent().with_answer("Gender", 1), &unweighted));
        assert!(!filter.matches(&respondent(), &unweighted));
    }

    #[test]
    fn test_non_integer_key_part_never_matches() {
        let filter = Filter::metric(MetricFilter::discrete(gender(), [1]));
        assert!(!filter.matches(&respondent().with_answer("Gender", 1), &cell("F")));
    }

    #[test]
    fn test_range_is_inclusive() {
        let filter = Filter::metric(MetricFilter::range(age(), 18, 24));
        for (age, expected) in [(17, false), (18, true), (24, true), (25, false)] {
            assert_eq!(filter.matches(&respondent().with_answer("Age", age), &cell("0")), expected);
        }
    }

    #[test]
    fn test_invert() {
        let filter = Filter::metric(MetricFilter::discrete(gender(), [0]).inverted());
        assert!(!filter.matches(&respondent(), &cell("0")));
        assert!(filter.matches(&respondent(), &cell("1")));
    }

    #[test]
    fn test_missing_value_fails_uninverted_test() {
        let filter = Filter::metric(MetricFilter::discrete(age(), [30]));
        assert!(!filter.matches(&respondent(), &cell("0")));
    }

    #[test]
    fn test_and_or() {
        let is_female = Filter::metric(MetricFilter::discrete(gender(), [1]));
        let is_young = Filter::metric(MetricFilter::range(age(), 18, 24));
        let young_female = respondent().with_answer("Age", 20);

        assert!(Filter::and([is_female.clone(), is_young.clone()]).matches(&young_female, &cell("1")));
        assert!(!Filter::and([is_female.clone(), is_young.clone()]).matches(&young_female, &cell("0")));
        assert!(Filter::or([is_female, is_young]).matches(&young_female, &cell("0")));
    }

    #[test]
    fn test_empty_combinators_are_vacuously_true() {
        assert!(Filter::and([]).matches(&respondent(), &cell("0")));
        assert!(Filter::or([]).matches(&respondent(), &cell("0")));
    }

    #[test]
    fn test_referenced_field_groups() {
        let filter = Filter::or([
            Filter::and([MetricFilter::discrete(gender(), [0]).into(), MetricFilter::range(age(), 1, 2).into()]),
            MetricFilter::discrete(gender(), [1]).into(),
        ]);
        assert_eq!(filter.referenced_field_groups(), BTreeSet::from(["Age", "Gender"]));
    }

    #[test]
    fn test_filter_from_json() {
        let json = r#"{"And": [{"Metric": {"measure": {"name": "Gender", "field_group": "Gender"}, "primary_values": [0]}}]}"#;
        let filter: Filter = serde_json::from_str(json).unwrap();
        assert_eq!(filter, Filter::and([MetricFilter::discrete(gender(), [0]).into()]));
    }
}
