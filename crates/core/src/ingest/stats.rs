use anyhow::{Context, Result};

use crate::config::Settings;
use crate::domain::biometric::DailyBiometricSample;
use crate::error::PipelineError;
use crate::ingest::source::BiometricSource;

// Postgres `undefined_column`.
const UNDEFINED_COLUMN: &str = "42703";

// Garmin stores some of these as integers; cast so every column decodes as f64.
const DAILY_STATS_SQL: &str = "SELECT date, \
     resting_heart_rate::FLOAT8 AS resting_heart_rate, \
     rest_stress_duration::FLOAT8 AS rest_stress_duration, \
     low_stress_duration::FLOAT8 AS low_stress_duration, \
     medium_stress_duration::FLOAT8 AS medium_stress_duration, \
     high_stress_duration::FLOAT8 AS high_stress_duration, \
     active_kilocalories::FLOAT8 AS active_kilocalories, \
     bmr_kilocalories::FLOAT8 AS bmr_kilocalories \
     FROM stats \
     ORDER BY date ASC";

/// Reads the daily `stats` table over the Postgres wire protocol
/// (CockroachDB included).
#[derive(Debug, Clone)]
pub struct PgBiometricSource {
    pool: sqlx::PgPool,
}

impl PgBiometricSource {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(settings: &Settings) -> Result<Self> {
        let db_url = settings.require_database_url()?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
            .context("connect DATABASE_URL failed")?;
        Ok(Self::new(pool))
    }
}

#[async_trait::async_trait]
impl BiometricSource for PgBiometricSource {
    fn source_name(&self) -> &'static str {
        "postgres_stats"
    }

    async fn fetch_daily_samples(&self) -> Result<Vec<DailyBiometricSample>> {
        let t0 = std::time::Instant::now();
        let samples = sqlx::query_as::<_, DailyBiometricSample>(DAILY_STATS_SQL)
            .persistent(false)
            .fetch_all(&self.pool)
            .await
            .map_err(stats_query_error)?;

        ensure_one_row_per_day(&samples)?;

        tracing::debug!(
            rows = samples.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "fetched daily stats"
        );
        Ok(samples)
    }
}

/// A stats table missing one of the expected columns is a data problem, not
/// an outage, so it surfaces as `MissingColumn`.
fn stats_query_error(err: sqlx::Error) -> anyhow::Error {
    let missing = match &err {
        sqlx::Error::ColumnNotFound(column) => Some(column.clone()),
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNDEFINED_COLUMN) => {
            Some(db.message().to_string())
        }
        _ => None,
    };
    match missing {
        Some(column) => anyhow::Error::new(PipelineError::missing_column(column))
            .context("select stats failed"),
        None => anyhow::Error::new(err).context("select stats failed"),
    }
}

/// Dates must be strictly increasing. Gaps are allowed.
pub fn ensure_one_row_per_day(samples: &[DailyBiometricSample]) -> Result<()> {
    for pair in samples.windows(2) {
        anyhow::ensure!(
            pair[0].date < pair[1].date,
            "stats rows must be one per day in ascending order (got {} then {})",
            pair[0].date,
            pair[1].date
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample(day: u32) -> DailyBiometricSample {
        DailyBiometricSample {
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            resting_heart_rate: Some(55.0),
            rest_stress_duration: None,
            low_stress_duration: None,
            medium_stress_duration: None,
            high_stress_duration: None,
            active_kilocalories: None,
            bmr_kilocalories: None,
        }
    }

    #[test]
    fn accepts_gaps_between_days() {
        assert!(ensure_one_row_per_day(&[sample(1), sample(2), sample(5)]).is_ok());
        assert!(ensure_one_row_per_day(&[]).is_ok());
    }

    #[test]
    fn missing_stats_column_is_a_pipeline_error() {
        let err = stats_query_error(sqlx::Error::ColumnNotFound("bmr_kilocalories".into()));
        assert_eq!(
            err.downcast_ref::<PipelineError>(),
            Some(&PipelineError::missing_column("bmr_kilocalories"))
        );
        assert!(format!("{err:#}").starts_with("select stats failed"));
    }

    #[test]
    fn other_query_errors_stay_opaque() {
        let err = stats_query_error(sqlx::Error::PoolTimedOut);
        assert!(err.downcast_ref::<PipelineError>().is_none());
        assert!(err.downcast_ref::<sqlx::Error>().is_some());
    }

    #[test]
    fn rejects_duplicate_or_unordered_days() {
        assert!(ensure_one_row_per_day(&[sample(1), sample(1)]).is_err());
        assert!(ensure_one_row_per_day(&[sample(3), sample(2)]).is_err());
    }
}
