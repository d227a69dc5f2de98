use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::ledger::DividendRecord;
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::rolling::ResamplePeriod;
use crate::time::calendar::period_start;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Monthly,
    Yearly,
}

impl Granularity {
    pub fn resample_period(self) -> ResamplePeriod {
        match self {
            Self::Monthly => ResamplePeriod::Month,
            Self::Yearly => ResamplePeriod::Year,
        }
    }

    pub fn bucket_start(self, date: NaiveDate) -> NaiveDate {
        period_start(date, self.resample_period())
    }

    /// Sortable label: `YYYY-MM` or `YYYY`.
    pub fn label(self, date: NaiveDate) -> String {
        match self {
            Self::Monthly => date.format("%Y-%m").to_string(),
            Self::Yearly => date.format("%Y").to_string(),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Monthly => f.write_str("monthly"),
            Self::Yearly => f.write_str("yearly"),
        }
    }
}

impl FromStr for Granularity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" | "month" => Ok(Self::Monthly),
            "yearly" | "year" => Ok(Self::Yearly),
            other => anyhow::bail!("unknown granularity {other:?} (expected monthly or yearly)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedBucket {
    pub period_start: NaiveDate,
    pub period_label: String,
    pub value: Decimal,
}

/// Sums dividend amounts per calendar bucket. Only buckets with at least one
/// record are emitted, oldest first.
pub fn aggregate(
    records: &[DividendRecord],
    granularity: Granularity,
) -> PipelineResult<Vec<AggregatedBucket>> {
    let mut buckets: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for record in records {
        let slot = buckets.entry(granularity.bucket_start(record.date)).or_default();
        *slot = slot
            .checked_add(record.amount)
            .ok_or(PipelineError::overflow("bucket total"))?;
    }

    Ok(buckets
        .into_iter()
        .map(|(start, value)| AggregatedBucket {
            period_start: start,
            period_label: granularity.label(start),
            value,
        })
        .collect())
}
