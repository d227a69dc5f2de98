use anyhow::Context;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::ledger::DividendRecord;
use crate::domain::table::RawTable;
use crate::error::PipelineResult;
use crate::ingest::cache::FetchCache;
use crate::ingest::source::LedgerSource;
use crate::pipeline::aggregate::{aggregate, AggregatedBucket, Granularity};
use crate::pipeline::normalize::{normalize_dividends, NormalizeOptions};
use crate::pipeline::rolling::{checked_sum, rolling_mean, ResamplePeriod, SeriesPoint};
use crate::time::calendar::first_of_month;

pub const TREND_WINDOW_MONTHS: usize = 12;

/// Everything the dividends page charts for one scale selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancePage {
    pub today: NaiveDate,
    pub scale: Granularity,
    /// Dividends on or after this date belong to the running month and are excluded.
    pub cutoff: NaiveDate,
    pub total: Decimal,
    pub dividends: Vec<DividendRecord>,
    pub buckets: Vec<AggregatedBucket>,
    /// 12-month trailing mean of monthly totals; only drawn on the monthly scale.
    pub trend: Option<Vec<SeriesPoint<Decimal>>>,
}

pub fn build_finance_page(
    raw: &RawTable,
    scale: Granularity,
    today: NaiveDate,
    opts: &NormalizeOptions,
) -> PipelineResult<FinancePage> {
    let dividends = normalize_dividends(raw, today, opts)?;
    let buckets = aggregate(&dividends, scale)?;
    let total = checked_sum(dividends.iter().map(|d| d.amount), "dividend total")?;

    let trend = match scale {
        Granularity::Monthly => {
            let series: Vec<(NaiveDate, Decimal)> =
                dividends.iter().map(|d| (d.date, d.amount)).collect();
            Some(rolling_mean(&series, ResamplePeriod::Month, TREND_WINDOW_MONTHS)?)
        }
        Granularity::Yearly => None,
    };

    Ok(FinancePage {
        today,
        scale,
        cutoff: first_of_month(today),
        total,
        dividends,
        buckets,
        trend,
    })
}

/// Fetches the ledger through `cache` and builds the page.
pub async fn load_finance_page(
    source: &dyn LedgerSource,
    cache: &FetchCache<RawTable>,
    scale: Granularity,
    today: NaiveDate,
    opts: &NormalizeOptions,
) -> anyhow::Result<FinancePage> {
    let raw = cache
        .get_or_fetch(|| source.fetch_ledger())
        .await
        .with_context(|| format!("failed to load ledger from {}", source.source_name()))?;

    let page = build_finance_page(&raw, scale, today, opts)?;
    tracing::info!(
        %today,
        %scale,
        dividends = page.dividends.len(),
        buckets = page.buckets.len(),
        "built finance page"
    );
    Ok(page)
}
