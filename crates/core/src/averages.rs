//! Average descriptors: the averaging context a computation runs in.

use crate::types::{TimeWindow, WeightingMethod};
use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Unit a descriptor's periods are counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodUnit {
    Day,
    Month,
    /// The whole available date range.
    All,
}

/// Identifies an averaging context and its weighting regime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AverageDescriptor {
    /// Unique id (e.g., "28Days").
    pub average_id: String,
    /// Human-readable name.
    pub display_name: String,
    /// Sort order for presentation.
    pub order: u32,
    /// Unit of `number_of_periods`.
    pub period_unit: PeriodUnit,
    /// Number of periods the average spans.
    pub number_of_periods: u32,
    /// How respondents are weighted.
    pub weighting_method: WeightingMethod,
    /// Whether the average is hidden from selection.
    #[serde(default)]
    pub disabled: bool,
}

impl AverageDescriptor {
    /// Minimal descriptor, mostly for tests and ad-hoc computations.
    pub fn new(average_id: impl Into<String>, weighting_method: WeightingMethod) -> Self {
        let average_id = average_id.into();
        Self {
            display_name: average_id.clone(),
            average_id,
            order: 0,
            period_unit: PeriodUnit::All,
            number_of_periods: 1,
            weighting_method,
            disabled: false,
        }
    }

    fn periodic(
        average_id: &str,
        display_name: &str,
        order: u32,
        period_unit: PeriodUnit,
        number_of_periods: u32,
        weighting_method: WeightingMethod,
        disabled: bool,
    ) -> Self {
        Self {
            average_id: average_id.to_string(),
            display_name: display_name.to_string(),
            order,
            period_unit,
            number_of_periods,
            weighting_method,
            disabled,
        }
    }

    /// The inclusive window this average covers when it ends on `end`.
    ///
    /// Returns `None` for [`PeriodUnit::All`], whose window is the full range of
    /// available data, and when the start date falls outside chrono's range.
    pub fn window_ending(&self, end: NaiveDate) -> Option<TimeWindow> {
        let back = self.number_of_periods.max(1) - 1;
        let start = match self.period_unit {
            PeriodUnit::Day => end.checked_sub_days(Days::new(u64::from(back)))?,
            PeriodUnit::Month => end.with_day(1)?.checked_sub_months(Months::new(back))?,
            PeriodUnit::All => return None,
        };
        Some(TimeWindow::new(start, end))
    }
}

/// Averages available when none are configured.
pub fn fallback_averages() -> Vec<AverageDescriptor> {
    use PeriodUnit::{All, Day, Month};
    use WeightingMethod::{None as Unweighted, QuotaCell};

    vec![
        AverageDescriptor::periodic("14Days", "14 days", 100, Day, 14, QuotaCell, false),
        AverageDescriptor::periodic("28Days", "28 days", 100, Day, 28, QuotaCell, false),
        AverageDescriptor::periodic("Weekly", "Weekly", 150, Day, 7, QuotaCell, false),
        AverageDescriptor::periodic("Monthly", "Monthly", 200, Month, 1, QuotaCell, false),
        AverageDescriptor::periodic("Quarterly", "Quarterly", 300, Month, 3, QuotaCell, false),
        AverageDescriptor::periodic("HalfYearly", "HalfYearly", 400, Month, 6, QuotaCell, false),
        AverageDescriptor::periodic("CustomPeriod", "Custom Period", 1, All, 1, QuotaCell, true),
        AverageDescriptor::periodic(
            "CustomPeriodNotWeighted",
            "Custom Period Not Weighted",
            2,
            All,
            1,
            Unweighted,
            true,
        ),
    ]
}
