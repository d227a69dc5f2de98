use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

pub const WEEKLY_WINDOW: usize = 7;
pub const MONTHLY_WINDOW: usize = 30;
pub const QUARTERLY_WINDOW: usize = 90;

/// Trailing-window means of a daily metric. Each delta is the window mean
/// minus the all-time mean; whether negative is good depends on the metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub weekly: f64,
    pub monthly: f64,
    pub quarterly: f64,
    pub all_time: f64,
    pub deltas: MetricDeltas,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricDeltas {
    pub weekly: f64,
    pub monthly: f64,
    pub quarterly: f64,
    pub all_time: f64,
}

/// Mean of the last `window` values (all of them when fewer exist).
pub fn window_mean(values: &[f64], window: usize) -> PipelineResult<f64> {
    if window == 0 {
        return Err(PipelineError::InvalidWindow { size: window });
    }
    if values.is_empty() {
        return Err(PipelineError::EmptySeries { what: "mean" });
    }
    let tail = &values[values.len().saturating_sub(window)..];
    Ok(tail.iter().sum::<f64>() / tail.len() as f64)
}

/// Summarizes a daily series ordered oldest first.
pub fn summarize(daily: &[f64]) -> PipelineResult<MetricSummary> {
    if daily.is_empty() {
        return Err(PipelineError::EmptySeries { what: "summary" });
    }

    let weekly = window_mean(daily, WEEKLY_WINDOW)?;
    let monthly = window_mean(daily, MONTHLY_WINDOW)?;
    let quarterly = window_mean(daily, QUARTERLY_WINDOW)?;
    let all_time = window_mean(daily, daily.len())?;

    Ok(MetricSummary {
        weekly,
        monthly,
        quarterly,
        all_time,
        deltas: MetricDeltas {
            weekly: weekly - all_time,
            monthly: monthly - all_time,
            quarterly: quarterly - all_time,
            all_time: 0.0,
        },
    })
}
