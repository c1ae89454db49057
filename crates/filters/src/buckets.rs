//! Inclusive integer buckets for discretizing numeric answers.

use quota_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A bucket of integers. `maximum_inclusive: None` means open-ended (`>= minimum`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntegerInclusiveBucket {
    pub minimum_inclusive: i32,
    pub maximum_inclusive: Option<i32>,
}

/// Comparison a bucket stands for when turned into a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketOperator {
    GreaterThan,
    Exactly,
    Between,
}

impl IntegerInclusiveBucket {
    /// Closed bucket `[minimum, maximum]`.
    pub const fn between(minimum: i32, maximum: i32) -> Self {
        Self {
            minimum_inclusive: minimum,
            maximum_inclusive: Some(maximum),
        }
    }

    /// Open-ended bucket `>= minimum`.
    pub const fn at_least(minimum: i32) -> Self {
        Self {
            minimum_inclusive: minimum,
            maximum_inclusive: None,
        }
    }

    /// Human label: `"65+"`, `"3"` or `"18 - 24"`.
    pub fn descriptor(&self) -> String {
        match self.maximum_inclusive {
            None => format!("{}+", self.minimum_inclusive),
            Some(max) if max == self.minimum_inclusive => format!("{max}"),
            Some(max) => format!("{} - {}", self.minimum_inclusive, max),
        }
    }

    pub fn operator(&self) -> BucketOperator {
        match self.maximum_inclusive {
            None => BucketOperator::GreaterThan,
            Some(max) if max == self.minimum_inclusive => BucketOperator::Exactly,
            Some(_) => BucketOperator::Between,
        }
    }

    #[inline]
    pub fn contains(&self, value: i32) -> bool {
        value >= self.minimum_inclusive && self.maximum_inclusive.map_or(true, |max| value <= max)
    }
}

impl fmt::Display for IntegerInclusiveBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor())
    }
}

/// Split `[minimum, maximum]` into `number_of_buckets` contiguous buckets.
///
/// Bounds are `bucket_size * i` and `bucket_size * (i + 1) - 1` from `minimum`,
/// rounded half away from zero, so the buckets cover the range exactly. A
/// reversed range (`maximum < minimum`) yields buckets in descending order,
/// each with its own bounds ascending.
pub fn create_buckets(minimum: i32, maximum: i32, number_of_buckets: i32) -> Result<Vec<IntegerInclusiveBucket>> {
    if number_of_buckets < 0 {
        return Err(Error::invalid_argument(format!(
            "number of buckets must not be negative, got {number_of_buckets}"
        )));
    }
    if number_of_buckets == 0 {
        return Ok(Vec::new());
    }

    let span = (i64::from(maximum) - i64::from(minimum)).abs() + 1;
    let bucket_size = span as f64 / f64::from(number_of_buckets);
    let direction: i64 = if maximum < minimum { -1 } else { 1 };
    let offset = |steps: f64| i64::from(minimum) + direction * steps.round() as i64;

    let buckets = (0..number_of_buckets)
        .map(|i| {
            let i = f64::from(i);
            let first = offset(bucket_size * i);
            let last = offset(bucket_size * (i + 1.0) - 1.0);
            let (low, high) = if first <= last { (first, last) } else { (last, first) };
            // Both ends lie within [minimum, maximum], so they fit in i32
            IntegerInclusiveBucket::between(low as i32, high as i32)
        })
        .collect();

    Ok(buckets)
}

/// Conventional age bands: 18–24, 25–34, 35–44, 45–54, 55–64, 65+.
pub fn create_buckets_for_age() -> Vec<IntegerInclusiveBucket> {
    vec![
        IntegerInclusiveBucket::between(18, 24),
        IntegerInclusiveBucket::between(25, 34),
        IntegerInclusiveBucket::between(35, 44),
        IntegerInclusiveBucket::between(45, 54),
        IntegerInclusiveBucket::between(55, 64),
        IntegerInclusiveBucket::at_least(65),
    ]
}

/// Number-of-children bands: 0 to 5 individually, then 6+.
pub fn create_buckets_for_number_of_children() -> Vec<IntegerInclusiveBucket> {
    (0..=5)
        .map(|n| IntegerInclusiveBucket::between(n, n))
        .chain(std::iter::once(IntegerInclusiveBucket::at_least(6)))
        .collect()
}
