//! Weighted aggregation over a respondent repository.
//!
//! Weights are always computed from the full grouping; pruning only narrows
//! which cells are retrieved afterwards, so it never changes a result.

use crate::result::{CellResult, WeightedResult};
use crate::targets::TargetDistribution;
use crate::weights::QuotaCellWeights;
use quota_core::{AverageDescriptor, Config, Error, GroupedQuotaCells, Result, TimeWindow, WeightingMethod};
use quota_filters::{EnforcedFilteredGroupedQuotaCells, Filter};
use quota_respondents::{ProfileResponseAccessor, RespondentRepository};
use tracing::debug;

/// What to aggregate.
#[derive(Debug, Clone)]
pub struct AggregationRequest {
    pub average: AverageDescriptor,
    /// Inclusive window; defaults to the average's window ending at the latest response.
    pub window: Option<TimeWindow>,
    /// Respondents must satisfy this to be counted.
    pub filter: Option<Filter>,
    /// Answer field to average.
    pub measure: Option<String>,
    /// Required for quota-cell weighted averages.
    pub targets: Option<TargetDistribution>,
}

impl AggregationRequest {
    pub fn new(average: AverageDescriptor) -> Self {
        Self {
            average,
            window: None,
            filter: None,
            measure: None,
            targets: None,
        }
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_measure(mut self, measure: impl Into<String>) -> Self {
        self.measure = Some(measure.into());
        self
    }

    pub fn with_targets(mut self, targets: TargetDistribution) -> Self {
        self.targets = Some(targets);
        self
    }
}

/// Computes weighted sample sizes and means for one subset.
#[derive(Debug, Clone, Copy)]
pub struct WeightedAggregator<'a> {
    repository: &'a RespondentRepository,
    config: &'a Config,
}

impl<'a> WeightedAggregator<'a> {
    pub fn new(repository: &'a RespondentRepository, config: &'a Config) -> Self {
        Self { repository, config }
    }

    /// Aggregate the respondents matching `request`.
    pub fn aggregate(&self, request: &AggregationRequest) -> Result<WeightedResult> {
        let accessor = ProfileResponseAccessor::new(self.repository, self.repository.subset())?;
        let grouping = self.repository.grouped_quota_cells(&request.average);
        let targets = self.targets(request)?;

        let Some(window) = self.resolve_window(request) else {
            debug!(subset = %self.repository.subset(), "no respondents to aggregate");
            return Ok(WeightedResult::empty(grouping.len()));
        };

        let weights = match &targets {
            Some(targets) => QuotaCellWeights::calculate(&accessor, &grouping, targets, &window)?,
            None => QuotaCellWeights::unweighted(&grouping),
        };

        let cells = self.prune(&grouping, request.filter.as_ref());
        let measure = request.measure.as_deref();

        let mut cell_results = Vec::new();
        for group in accessor.get_responses(&cells).within_window(&window) {
            let cell = &group.quota_cell;
            let mut cell_result = CellResult::new(cell, weights.weight_for(cell));
            for respondent in group.profiles {
                if request.filter.as_ref().map_or(true, |f| f.matches(respondent, cell)) {
                    cell_result.add(respondent, measure);
                }
            }
            if !cell_result.is_empty() {
                cell_results.push(cell_result);
            }
        }

        let result = WeightedResult::from_cells(cell_results, grouping.len(), grouping.len() - cells.len());
        debug!(
            subset = %self.repository.subset(),
            average = %request.average.average_id,
            start = %window.start,
            end = %window.end,
            cells_considered = result.cells_considered,
            cells_pruned = result.cells_pruned,
            sample_size = result.unweighted_sample_size,
            weighted_sample_size = result.weighted_sample_size,
            "aggregated respondents"
        );
        Ok(result)
    }

    /// Validated targets for weighted averages, `None` for unweighted ones.
    fn targets(&self, request: &AggregationRequest) -> Result<Option<TargetDistribution>> {
        match request.average.weighting_method {
            WeightingMethod::None => Ok(None),
            WeightingMethod::QuotaCell => {
                let targets = request.targets.clone().ok_or_else(|| {
                    Error::config(format!(
                        "average {} is quota-cell weighted but no targets were given",
                        request.average.average_id
                    ))
                })?;
                let subset = self.repository.subset();
                if &targets.subset != subset {
                    return Err(Error::subset_mismatch(&subset.id, &targets.subset.id));
                }
                targets.validate_and_normalize(&self.config.weighting).map(Some)
            }
        }
    }

    fn resolve_window(&self, request: &AggregationRequest) -> Option<TimeWindow> {
        if let Some(window) = request.window {
            return Some(window);
        }
        let earliest = self.repository.earliest_response_date()?;
        let latest = self.repository.latest_response_date()?;
        Some(
            request
                .average
                .window_ending(latest)
                .unwrap_or_else(|| TimeWindow::new(earliest, latest)),
        )
    }

    /// Cells that may hold a respondent matching `filter`.
    ///
    /// Prunes on every field group the grouping is keyed on, for weighted and
    /// unweighted averages alike.
    fn prune(&self, grouping: &GroupedQuotaCells, filter: Option<&Filter>) -> GroupedQuotaCells {
        match filter {
            Some(filter) if self.config.pruning.enabled => {
                EnforcedFilteredGroupedQuotaCells::from_grouping(grouping.clone()).filter_unnecessary(filter)
            }
            _ => grouping.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targets::CellTarget;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use quota_core::{FieldGroup, ProfileResponseEntity, Subset};
    use quota_filters::{Measure, MetricFilter};
    use std::collections::BTreeMap;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 7, d).unwrap()
    }

    fn parts(gender: i32, region: i32) -> BTreeMap<FieldGroup, String> {
        BTreeMap::from([
            ("Gender".to_string(), gender.to_string()),
            ("Region".to_string(), region.to_string()),
        ])
    }

    /// Gender {0, 1} x Region {0, 1, 2}, unevenly filled over July 1st to 10th.
    fn repository() -> RespondentRepository {
        let mut repo = RespondentRepository::new(Subset::new("UK"));
        let mut id = 0;
        for gender in 0..2 {
            for region in 0..3 {
                let respondents = 2 + gender * 3 + region;
                for i in 0..respondents {
                    let respondent = ProfileResponseEntity::new(id, day(1 + (id % 10) as u32), -1)
                        .with_answer("Gender", gender)
                        .with_answer("Region", region)
                        .with_answer("Age", 18 + (id as i32 * 7) % 50)
                        .with_answer("Score", 1 + (i + region) % 5);
                    repo.add_with_key_parts(respondent, parts(gender, region)).unwrap();
                    id += 1;
                }
            }
        }
        repo
    }

    fn targets() -> TargetDistribution {
        let targets = [(0, 0, 10.0), (0, 1, 20.0), (0, 2, 20.0), (1, 0, 15.0), (1, 1, 15.0), (1, 2, 20.0)]
            .into_iter()
            .map(|(g, r, t)| CellTarget::new(parts(g, r), t))
            .collect();
        TargetDistribution::new(Subset::new("UK"), targets)
    }

    fn weighted() -> AverageDescriptor {
        AverageDescriptor::new("CustomPeriod", WeightingMethod::QuotaCell)
    }

    fn unweighted() -> AverageDescriptor {
        AverageDescriptor::new("CustomPeriodNotWeighted", WeightingMethod::None)
    }

    fn metric(field_group: &str, values: &[i32]) -> Filter {
        MetricFilter::discrete(Measure::for_field_group(field_group), values.iter().copied()).into()
    }

    fn without_pruning() -> Config {
        let mut config = Config::default();
        config.pruning.enabled = false;
        config
    }

    #[test]
    fn test_unweighted_counts_every_respondent() {
        let repo = repository();
        let config = Config::default();
        let result = WeightedAggregator::new(&repo, &config)
            .aggregate(&AggregationRequest::new(unweighted()))
            .unwrap();

        assert_eq!(result.unweighted_sample_size, repo.count());
        assert_relative_eq!(result.weighted_sample_size, repo.count() as f64);
        assert_eq!(result.cells_considered, 7);
    }

    #[test]
    fn test_weighted_sample_size_matches_total() {
        let repo = repository();
        let config = Config::default();
        let request = AggregationRequest::new(weighted()).with_targets(targets());
        let result = WeightedAggregator::new(&repo, &config).aggregate(&request).unwrap();

        assert_eq!(result.unweighted_sample_size, repo.count());
        assert_relative_eq!(result.weighted_sample_size, repo.count() as f64, epsilon = 1e-9);
        for cell in &result.cells {
            assert_relative_eq!(
                cell.weighted_sample_size,
                cell.weight * cell.unweighted_sample_size as f64,
                max_relative = 1e-12
            );
        }
    }

    #[test]
    fn test_weighted_share_of_filtered_cells_hits_target() {
        let repo = repository();
        let config = Config::default();
        let request = AggregationRequest::new(weighted())
            .with_targets(targets())
            .with_filter(metric("Gender", &[1]));
        let result = WeightedAggregator::new(&repo, &config).aggregate(&request).unwrap();

        assert_relative_eq!(result.weighted_sample_size / repo.count() as f64, 0.5, epsilon = 1e-9);
        assert_eq!(result.cells_pruned, 3);
    }

    #[test]
    fn test_pruning_does_not_change_results() {
        let repo = repository();
        let pruned_config = Config::default();
        let full_config = without_pruning();

        let filters = [
            metric("Gender", &[0]),
            Filter::and([metric("Gender", &[1]), metric("Region", &[0, 2])]),
            Filter::or([metric("Region", &[1]), metric("Region", &[2])]),
            Filter::or([metric("Gender", &[0]), metric("Region", &[2])]),
            Filter::and([
                Filter::metric(MetricFilter::range(Measure::for_field_group("Age"), 30, 45)),
                metric("Region", &[1]),
            ]),
            Filter::metric(MetricFilter::discrete(Measure::for_field_group("Gender"), [0]).inverted()),
        ];

        for average in [weighted(), unweighted()] {
            for filter in &filters {
                let request = AggregationRequest::new(average.clone())
                    .with_targets(targets())
                    .with_filter(filter.clone())
                    .with_measure("Score")
                    .with_window(TimeWindow::new(day(2), day(8)));

                let pruned = WeightedAggregator::new(&repo, &pruned_config).aggregate(&request).unwrap();
                let full = WeightedAggregator::new(&repo, &full_config).aggregate(&request).unwrap();

                assert_eq!(pruned.unweighted_sample_size, full.unweighted_sample_size, "{filter:?}");
                assert_relative_eq!(pruned.weighted_sample_size, full.weighted_sample_size, epsilon = 1e-9);
                assert_eq!(pruned.weighted_mean.is_some(), full.weighted_mean.is_some());
                if let (Some(a), Some(b)) = (pruned.weighted_mean, full.weighted_mean) {
                    assert_relative_eq!(a, b, epsilon = 1e-9);
                }
                assert_eq!(pruned.cells, full.cells);
                assert_eq!(full.cells_pruned, 0);
            }
        }
    }

    #[test]
    fn test_unweighted_filtered_request_prunes() {
        let repo = repository();
        let config = Config::default();
        let request = AggregationRequest::new(unweighted()).with_filter(metric("Gender", &[0]));
        let result = WeightedAggregator::new(&repo, &config).aggregate(&request).unwrap();

        assert_eq!(result.cells_considered, 7);
        assert_eq!(result.cells_pruned, 3);
        assert_eq!(result.unweighted_sample_size, 9);
    }

    #[test]
    fn test_answers_disagreeing_with_cell_give_same_result_with_pruning() {
        let mut repo = RespondentRepository::new(Subset::new("UK"));
        for (id, cell_gender) in [(0, "0"), (1, "1")] {
            let respondent = ProfileResponseEntity::new(id, day(1), -1).with_answer("Gender", 1);
            repo.add_with_key_parts(respondent, BTreeMap::from([("Gender".to_string(), cell_gender.to_string())]))
                .unwrap();
        }
        let targets = TargetDistribution::new(
            Subset::new("UK"),
            vec![
                CellTarget::new(BTreeMap::from([("Gender".to_string(), "0".to_string())]), 0.5),
                CellTarget::new(BTreeMap::from([("Gender".to_string(), "1".to_string())]), 0.5),
            ],
        );
        let request = AggregationRequest::new(weighted())
            .with_targets(targets)
            .with_filter(metric("Gender", &[1]));

        let pruned = WeightedAggregator::new(&repo, &Config::default()).aggregate(&request).unwrap();
        let full = WeightedAggregator::new(&repo, &without_pruning()).aggregate(&request).unwrap();

        assert_eq!(pruned.cells_pruned, 1);
        assert_eq!(pruned.unweighted_sample_size, full.unweighted_sample_size);
        assert_relative_eq!(pruned.weighted_sample_size, full.weighted_sample_size);
        assert_eq!(pruned.unweighted_sample_size, 1);
    }

    #[test]
    fn test_weighted_mean_of_measure() {
        let mut repo = RespondentRepository::new(Subset::new("UK"));
        let scores = [(0, 10), (0, 10), (0, 10), (1, 2)];
        for (id, (gender, score)) in scores.into_iter().enumerate() {
            let respondent = ProfileResponseEntity::new(id as i64, day(1), -1).with_answer("Score", score);
            repo.add_with_key_parts(respondent, BTreeMap::from([("Gender".to_string(), gender.to_string())]))
                .unwrap();
        }
        let targets = TargetDistribution::new(
            Subset::new("UK"),
            vec![
                CellTarget::new(BTreeMap::from([("Gender".to_string(), "0".to_string())]), 0.5),
                CellTarget::new(BTreeMap::from([("Gender".to_string(), "1".to_string())]), 0.5),
            ],
        );
        let config = Config::default();

        let weighted_result = WeightedAggregator::new(&repo, &config)
            .aggregate(&AggregationRequest::new(weighted()).with_targets(targets).with_measure("Score"))
            .unwrap();
        assert_relative_eq!(weighted_result.weighted_mean.unwrap(), 6.0, epsilon = 1e-9);

        let unweighted_result = WeightedAggregator::new(&repo, &config)
            .aggregate(&AggregationRequest::new(unweighted()).with_measure("Score"))
            .unwrap();
        assert_relative_eq!(unweighted_result.weighted_mean.unwrap(), 8.0);
    }

    #[test]
    fn test_window_limits_respondents() {
        let repo = repository();
        let config = Config::default();
        let window = TimeWindow::single_day(day(3));
        let request = AggregationRequest::new(unweighted()).with_window(window);
        let result = WeightedAggregator::new(&repo, &config).aggregate(&request).unwrap();

        let expected = repo
            .all_cells_group()
            .iter()
            .flat_map(|c| repo.respondents_in(c))
            .filter(|r| window.contains(r.response_date))
            .count();
        assert_eq!(result.unweighted_sample_size, expected);
        assert!(expected > 0);
    }

    #[test]
    fn test_missing_targets_is_config_error() {
        let repo = repository();
        let config = Config::default();
        let err = WeightedAggregator::new(&repo, &config)
            .aggregate(&AggregationRequest::new(weighted()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_targets_for_other_subset_is_mismatch() {
        let repo = repository();
        let config = Config::default();
        let targets = TargetDistribution::new(Subset::new("US"), targets().targets);
        let err = WeightedAggregator::new(&repo, &config)
            .aggregate(&AggregationRequest::new(weighted()).with_targets(targets))
            .unwrap_err();
        assert!(matches!(err, Error::SubsetMismatch { .. }));
    }

    #[test]
    fn test_empty_repository_yields_empty_result() {
        let repo = RespondentRepository::new(Subset::new("UK"));
        let config = Config::default();
        let result = WeightedAggregator::new(&repo, &config)
            .aggregate(&AggregationRequest::new(unweighted()))
            .unwrap();
        assert_eq!(result, WeightedResult::empty(1));
    }
}
