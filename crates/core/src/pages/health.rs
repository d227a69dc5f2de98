use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::biometric::{DailyBiometricSample, StressLevel};
use crate::error::PipelineResult;
use crate::ingest::source::BiometricSource;
use crate::pipeline::reshape::{melt, LongFormTable, ValueColumn};
use crate::pipeline::rolling::{trailing_mean, SeriesPoint};
use crate::pipeline::summary::{summarize, window_mean, MetricSummary, WEEKLY_WINDOW};

pub const RHR_TREND_WINDOW: usize = 7;

const CALORIE_COLUMNS: [ValueColumn<'static>; 2] = [
    ValueColumn::named("active_kilocalories"),
    ValueColumn::named("bmr_kilocalories"),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryValue {
    pub category: String,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthPage {
    pub day_count: usize,
    pub resting_heart_rate: Vec<SeriesPoint<f64>>,
    pub resting_heart_rate_summary: MetricSummary,
    pub resting_heart_rate_trend: Vec<SeriesPoint<f64>>,
    /// Mean duration per stress level over the most recent week.
    pub stress_past_week: Vec<CategoryValue>,
    pub stress_history: LongFormTable<NaiveDate, Option<f64>>,
    pub calories: LongFormTable<NaiveDate, Option<f64>>,
}

/// Builds the health page from daily samples ordered oldest first.
///
/// Days without a resting heart rate are skipped by the RHR summary and
/// trend; the trend averages the last 7 recorded days rather than a
/// zero-filled calendar.
pub fn build_health_page(samples: &[DailyBiometricSample]) -> PipelineResult<HealthPage> {
    let rhr: Vec<SeriesPoint<f64>> = samples
        .iter()
        .filter_map(|s| {
            s.resting_heart_rate.map(|value| SeriesPoint {
                period: s.date,
                value,
            })
        })
        .collect();
    let rhr_values: Vec<f64> = rhr.iter().map(|p| p.value).collect();

    let resting_heart_rate_summary = summarize(&rhr_values)?;
    let resting_heart_rate_trend = trailing_mean(&rhr, RHR_TREND_WINDOW)?;

    let stress_columns: Vec<ValueColumn<'static>> = StressLevel::ALL
        .iter()
        .map(|level| ValueColumn::new(level.column(), level.label()))
        .collect();
    let stress_history =
        melt(samples, "date", &stress_columns)?.with_names("stress_level", "duration");
    let calories = melt(samples, "date", &CALORIE_COLUMNS)?.with_names("Type", "calories");

    Ok(HealthPage {
        day_count: samples.len(),
        resting_heart_rate: rhr,
        resting_heart_rate_summary,
        resting_heart_rate_trend,
        stress_past_week: stress_past_week(samples)?,
        stress_history,
        calories,
    })
}

fn stress_past_week(samples: &[DailyBiometricSample]) -> PipelineResult<Vec<CategoryValue>> {
    let recent = &samples[samples.len().saturating_sub(WEEKLY_WINDOW)..];
    StressLevel::ALL
        .iter()
        .map(|level| -> PipelineResult<CategoryValue> {
            let values: Vec<f64> = recent.iter().filter_map(|s| level.duration(s)).collect();
            let value = if values.is_empty() {
                None
            } else {
                Some(window_mean(&values, values.len())?)
            };
            Ok(CategoryValue {
                category: level.label().to_string(),
                value,
            })
        })
        .collect()
}

pub async fn load_health_page(source: &dyn BiometricSource) -> anyhow::Result<HealthPage> {
    let samples = source
        .fetch_daily_samples()
        .await
        .with_context(|| format!("failed to load daily samples from {}", source.source_name()))?;

    let page = build_health_page(&samples)?;
    tracing::info!(
        days = page.day_count,
        weekly_rhr = page.resting_heart_rate_summary.weekly,
        "built health page"
    );
    Ok(page)
}
