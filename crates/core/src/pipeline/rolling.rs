use std::collections::{BTreeMap, VecDeque};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::time::calendar::{next_period_start, period_start};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResamplePeriod {
    Day,
    Month,
    Year,
}

/// Values the smoother can sum and average. `checked_add` is `None` when the
/// sum leaves the representable range.
pub trait Numeric: Copy + Default {
    fn checked_add(self, other: Self) -> Option<Self>;

    fn mean_of(sum: Self, count: usize) -> Self;
}

impl Numeric for f64 {
    fn checked_add(self, other: Self) -> Option<Self> {
        let sum = self + other;
        sum.is_finite().then_some(sum)
    }

    fn mean_of(sum: Self, count: usize) -> Self {
        sum / count as f64
    }
}

impl Numeric for Decimal {
    fn checked_add(self, other: Self) -> Option<Self> {
        Decimal::checked_add(self, other)
    }

    fn mean_of(sum: Self, count: usize) -> Self {
        sum / Decimal::from(count)
    }
}

/// Sums `values`, failing instead of overflowing.
pub fn checked_sum<V: Numeric>(
    values: impl IntoIterator<Item = V>,
    what: &'static str,
) -> PipelineResult<V> {
    values.into_iter().try_fold(V::default(), |acc, v| {
        acc.checked_add(v).ok_or(PipelineError::overflow(what))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint<V> {
    pub period: NaiveDate,
    pub value: V,
}

/// One row per period from the first to the last observed period, each the
/// sum of the values falling inside it. Periods without observations are 0.
///
/// Input order does not matter.
pub fn resample<V: Numeric>(
    series: &[(NaiveDate, V)],
    period: ResamplePeriod,
) -> PipelineResult<Vec<SeriesPoint<V>>> {
    let mut sums: BTreeMap<NaiveDate, V> = BTreeMap::new();
    for &(date, value) in series {
        let slot = sums.entry(period_start(date, period)).or_default();
        *slot = slot
            .checked_add(value)
            .ok_or(PipelineError::overflow("period total"))?;
    }

    let (Some(&first), Some(&last)) = (sums.keys().next(), sums.keys().next_back()) else {
        return Ok(Vec::new());
    };

    let mut out = Vec::with_capacity(sums.len());
    let mut cursor = Some(first);
    while let Some(start) = cursor.filter(|s| *s <= last) {
        out.push(SeriesPoint {
            period: start,
            value: sums.get(&start).copied().unwrap_or_default(),
        });
        cursor = next_period_start(start, period);
    }
    Ok(out)
}

/// Mean of the last `window` points ending at each point, inclusive. The
/// leading points average whatever is available so far.
///
/// Expects a fixed-cadence series; no resampling happens here.
pub fn trailing_mean<V: Numeric>(
    series: &[SeriesPoint<V>],
    window: usize,
) -> PipelineResult<Vec<SeriesPoint<V>>> {
    if window == 0 {
        return Err(PipelineError::InvalidWindow { size: window });
    }

    let mut buf: VecDeque<V> = VecDeque::with_capacity(window);
    let mut out = Vec::with_capacity(series.len());
    for point in series {
        buf.push_back(point.value);
        if buf.len() > window {
            buf.pop_front();
        }
        let sum = checked_sum(buf.iter().copied(), "window total")?;
        out.push(SeriesPoint {
            period: point.period,
            value: V::mean_of(sum, buf.len()),
        });
    }
    Ok(out)
}

/// Resamples to `period` (zero-filling gaps) and applies a `window`-period
/// trailing mean.
pub fn rolling_mean<V: Numeric>(
    series: &[(NaiveDate, V)],
    period: ResamplePeriod,
    window: usize,
) -> PipelineResult<Vec<SeriesPoint<V>>> {
    if window == 0 {
        return Err(PipelineError::InvalidWindow { size: window });
    }
    trailing_mean(&resample(series, period)?, window)
}
