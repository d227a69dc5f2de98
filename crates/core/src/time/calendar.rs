use anyhow::Context;
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};

use crate::pipeline::rolling::ResamplePeriod;

/// Resolves the date the pipelines treat as "today".
///
/// An explicit `YYYY-MM-DD` argument wins; otherwise `now_utc` is shifted by
/// the configured offset (minutes east of UTC).
pub fn resolve_today(
    today_arg: Option<&str>,
    now_utc: DateTime<Utc>,
    utc_offset_minutes: i32,
) -> anyhow::Result<NaiveDate> {
    if let Some(s) = today_arg {
        return NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid date {s:?}, expected YYYY-MM-DD"));
    }

    let offset = utc_offset_minutes
        .checked_mul(60)
        .and_then(chrono::FixedOffset::east_opt)
        .with_context(|| format!("invalid UTC offset: {utc_offset_minutes} minutes"))?;
    Ok(now_utc.with_timezone(&offset).date_naive())
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First day of the period containing `date`.
pub fn period_start(date: NaiveDate, period: ResamplePeriod) -> NaiveDate {
    match period {
        ResamplePeriod::Day => date,
        ResamplePeriod::Month => first_of_month(date),
        ResamplePeriod::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
    }
}

/// First day of the period following the one starting at `start`.
/// `None` only at the end of chrono's supported range.
pub fn next_period_start(start: NaiveDate, period: ResamplePeriod) -> Option<NaiveDate> {
    match period {
        ResamplePeriod::Day => start.succ_opt(),
        ResamplePeriod::Month => first_of_month(start).checked_add_months(Months::new(1)),
        ResamplePeriod::Year => NaiveDate::from_ymd_opt(start.year() + 1, 1, 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn explicit_date_wins() {
        let now = Utc.with_ymd_and_hms(2026, 1, 3, 8, 0, 0).unwrap();
        let today = resolve_today(Some("2024-02-29"), now, 0).unwrap();
        assert_eq!(today, d(2024, 2, 29));
    }

    #[test]
    fn rejects_malformed_explicit_date() {
        let now = Utc.with_ymd_and_hms(2026, 1, 3, 8, 0, 0).unwrap();
        assert!(resolve_today(Some("02/29/2024"), now, 0).is_err());
    }

    #[test]
    fn applies_offset_across_midnight() {
        // 2026-01-31 23:30 UTC is already February 1st at UTC+1.
        let now = Utc.with_ymd_and_hms(2026, 1, 31, 23, 30, 0).unwrap();
        assert_eq!(resolve_today(None, now, 0).unwrap(), d(2026, 1, 31));
        assert_eq!(resolve_today(None, now, 60).unwrap(), d(2026, 2, 1));
    }

    #[test]
    fn rejects_out_of_range_offsets() {
        let now = Utc.with_ymd_and_hms(2026, 1, 3, 8, 0, 0).unwrap();
        assert!(resolve_today(None, now, 24 * 60).is_err());
        assert!(resolve_today(None, now, 100_000_000).is_err());
        assert!(resolve_today(None, now, i32::MIN).is_err());
    }

    #[test]
    fn period_boundaries() {
        assert_eq!(period_start(d(2024, 2, 20), ResamplePeriod::Month), d(2024, 2, 1));
        assert_eq!(period_start(d(2024, 2, 20), ResamplePeriod::Year), d(2024, 1, 1));
        assert_eq!(
            next_period_start(d(2024, 12, 1), ResamplePeriod::Month),
            Some(d(2025, 1, 1))
        );
        assert_eq!(
            next_period_start(d(2024, 2, 28), ResamplePeriod::Day),
            Some(d(2024, 2, 29))
        );
        assert_eq!(
            next_period_start(d(2024, 1, 1), ResamplePeriod::Year),
            Some(d(2025, 1, 1))
        );
    }
}
