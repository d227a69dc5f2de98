use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::domain::ledger::{DividendRecord, EntryType, LedgerEntry};
use crate::domain::table::RawTable;
use crate::error::{PipelineError, PipelineResult};
use crate::time::calendar::first_of_month;

pub const DATE_COLUMN: &str = "Date";
pub const TYPE_COLUMN: &str = "Type";
pub const STOCK_COLUMN: &str = "Stock";
pub const VALUE_COLUMN: &str = "Transacted Value";

pub const LEDGER_COLUMNS: [&str; 4] = [DATE_COLUMN, TYPE_COLUMN, STOCK_COLUMN, VALUE_COLUMN];

// Two-digit-year variants go first: chrono's %Y happily reads "24" as year 24.
const DEFAULT_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%m/%d/%Y %H:%M:%S",
    "%b %d, %Y",
    "%d %b %Y",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// chrono formats tried in order; the first match wins.
    pub date_formats: Vec<String>,
    pub currency_symbol: char,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            date_formats: DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect(),
            currency_symbol: '$',
        }
    }
}

impl NormalizeOptions {
    /// Overrides the date formats with a comma-separated list, ignoring blanks.
    pub fn with_date_formats_csv(mut self, formats: &str) -> Self {
        let parsed: Vec<String> = formats
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();
        if !parsed.is_empty() {
            self.date_formats = parsed;
        }
        self
    }
}

/// Reduces a raw transaction ledger to the dividends of fully completed months,
/// most recent first.
///
/// Rows dated on or after the first day of `today`'s month are dropped. Dates
/// are only parsed for dividend rows, so a malformed date on any other row is
/// not an error. Amounts are parsed before the month cut-off is applied.
pub fn normalize_dividends(
    raw: &RawTable,
    today: NaiveDate,
    opts: &NormalizeOptions,
) -> PipelineResult<Vec<DividendRecord>> {
    if raw.columns.is_empty() && raw.is_empty() {
        return Ok(Vec::new());
    }

    let ledger = raw.project(&LEDGER_COLUMNS)?;

    let mut dividends = ledger_entries(&ledger)
        .filter(|entry| entry.entry_type.is_dividend())
        .map(|entry| parse_ledger_date(&entry.date, &opts.date_formats).map(|date| (date, entry)))
        .collect::<PipelineResult<Vec<_>>>()?;

    dividends.sort_by(|a, b| b.0.cmp(&a.0));

    let cutoff = first_of_month(today);
    let mut out = Vec::with_capacity(dividends.len());
    for (date, entry) in dividends {
        let amount = parse_currency(&entry.transacted_value, opts.currency_symbol)?;
        if date < cutoff {
            out.push(DividendRecord {
                date,
                stock: entry.stock,
                amount,
            });
        }
    }

    tracing::debug!(
        ledger_rows = raw.len(),
        dividends = out.len(),
        %cutoff,
        "normalized dividend ledger"
    );

    Ok(out)
}

/// Expects a table already projected to [`LEDGER_COLUMNS`].
fn ledger_entries(ledger: &RawTable) -> impl Iterator<Item = LedgerEntry> + '_ {
    (0..ledger.len()).map(move |r| LedgerEntry {
        date: ledger.cell(r, 0).trim().to_string(),
        entry_type: EntryType::parse(ledger.cell(r, 1)),
        stock: ledger.cell(r, 2).trim().to_string(),
        transacted_value: ledger.cell(r, 3).to_string(),
    })
}

pub fn parse_ledger_date(value: &str, formats: &[String]) -> PipelineResult<NaiveDate> {
    let s = value.trim();
    formats
        .iter()
        .find_map(|f| {
            NaiveDate::parse_from_str(s, f)
                .or_else(|_| NaiveDateTime::parse_from_str(s, f).map(|dt| dt.date()))
                .ok()
        })
        .ok_or_else(|| PipelineError::MalformedDate {
            value: value.to_string(),
        })
}

/// Parses a currency-formatted amount such as `"$1,234.50"` or `"-$5.00"`.
pub fn parse_currency(value: &str, symbol: char) -> PipelineResult<Decimal> {
    let malformed = || PipelineError::MalformedCurrency {
        value: value.to_string(),
    };

    let s = value.trim();
    let (mut negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, s),
    };
    let mut s = s.strip_prefix(symbol).unwrap_or(s).trim_start();
    if !negative {
        if let Some(rest) = s.strip_prefix('-') {
            negative = true;
            s = rest;
        }
    }

    let digits: String = s.chars().filter(|c| *c != ',').collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(malformed());
    }

    let amount = Decimal::from_str(&digits).map_err(|_| malformed())?;
    Ok(if negative { -amount } else { amount })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn ledger(rows: &[[&str; 4]]) -> RawTable {
        RawTable::new(
            LEDGER_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn keeps_only_dividends_sorted_descending() {
        let raw = ledger(&[
            ["2024-01-15", "Div", "KO", "$10.00"],
            ["2024-02-10", "Div", "PEP", "$5.00"],
            ["2024-02-20", "Buy", "KO", "$100"],
        ]);
        let out = normalize_dividends(&raw, d(2024, 6, 1), &NormalizeOptions::default()).unwrap();
        assert_eq!(
            out,
            vec![
                DividendRecord {
                    date: d(2024, 2, 10),
                    stock: "PEP".into(),
                    amount: dec!(5.00),
                },
                DividendRecord {
                    date: d(2024, 1, 15),
                    stock: "KO".into(),
                    amount: dec!(10.00),
                },
            ]
        );
    }

    #[test]
    fn drops_current_month() {
        let raw = ledger(&[
            ["2024-05-31", "Div", "KO", "$1.00"],
            ["2024-06-01", "Div", "KO", "$2.00"],
            ["2024-06-14", "Div", "KO", "$3.00"],
        ]);
        let out = normalize_dividends(&raw, d(2024, 6, 14), &NormalizeOptions::default()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].date, d(2024, 5, 31));
    }

    #[test]
    fn extra_columns_are_ignored() {
        let raw = RawTable::new(
            vec![
                "Stock".into(),
                "Notes".into(),
                "Date".into(),
                "Transacted Value".into(),
                "Type".into(),
            ],
            vec![vec![
                "KO".into(),
                "q1".into(),
                "01/15/2024".into(),
                "$1,200.50".into(),
                "Div".into(),
            ]],
        );
        let out = normalize_dividends(&raw, d(2024, 6, 1), &NormalizeOptions::default()).unwrap();
        assert_eq!(out[0].date, d(2024, 1, 15));
        assert_eq!(out[0].amount, dec!(1200.50));
    }

    #[test]
    fn empty_ledger_is_not_an_error() {
        let opts = NormalizeOptions::default();
        let today = d(2024, 6, 1);
        assert!(normalize_dividends(&RawTable::default(), today, &opts)
            .unwrap()
            .is_empty());
        assert!(normalize_dividends(&ledger(&[]), today, &opts)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn type_must_match_exactly() {
        let raw = ledger(&[
            ["2024-01-02", " Div ", "KO", "$1.00"],
            ["2024-01-03", "div", "KO", "$2.00"],
            ["2024-01-04", "Div", "KO", "$3.00"],
        ]);
        let out = normalize_dividends(&raw, d(2024, 6, 1), &NormalizeOptions::default()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].amount, dec!(3.00));
    }

    #[test]
    fn missing_column_is_reported() {
        let raw = RawTable::new(vec!["Date".into(), "Type".into()], vec![]);
        let err =
            normalize_dividends(&raw, d(2024, 6, 1), &NormalizeOptions::default()).unwrap_err();
        assert_eq!(err, PipelineError::missing_column("Stock"));
    }

    #[test]
    fn malformed_dividend_date_fails() {
        let raw = ledger(&[["someday", "Div", "KO", "$1.00"]]);
        let err =
            normalize_dividends(&raw, d(2024, 6, 1), &NormalizeOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedDate { .. }));
    }

    #[test]
    fn malformed_date_on_other_rows_is_ignored() {
        let raw = ledger(&[
            ["n/a", "Buy", "KO", "$1.00"],
            ["2024-01-02", "Div", "KO", "$1.00"],
        ]);
        let out = normalize_dividends(&raw, d(2024, 6, 1), &NormalizeOptions::default()).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn malformed_amount_fails_even_in_current_month() {
        let raw = ledger(&[["2024-06-03", "Div", "KO", "$abc"]]);
        let err =
            normalize_dividends(&raw, d(2024, 6, 10), &NormalizeOptions::default()).unwrap_err();
        assert_eq!(
            err,
            PipelineError::MalformedCurrency {
                value: "$abc".into()
            }
        );
    }

    #[test]
    fn currency_variants() {
        assert_eq!(parse_currency("$123.45", '$').unwrap(), dec!(123.45));
        assert_eq!(parse_currency(" $1,000 ", '$').unwrap(), dec!(1000));
        assert_eq!(parse_currency("-$5.10", '$').unwrap(), dec!(-5.10));
        assert_eq!(parse_currency("$-5.10", '$').unwrap(), dec!(-5.10));
        assert_eq!(parse_currency("7", '$').unwrap(), dec!(7));
        assert_eq!(parse_currency("€7", '€').unwrap(), dec!(7));
        assert!(parse_currency("$", '$').is_err());
        assert!(parse_currency("", '$').is_err());
        assert!(parse_currency("$1.2.3", '$').is_err());
        assert!(parse_currency("-$-1", '$').is_err());
    }

    #[test]
    fn date_formats() {
        let formats = NormalizeOptions::default().date_formats;
        assert_eq!(parse_ledger_date("2024-01-15", &formats).unwrap(), d(2024, 1, 15));
        assert_eq!(parse_ledger_date("1/15/2024", &formats).unwrap(), d(2024, 1, 15));
        assert_eq!(parse_ledger_date("1/15/24", &formats).unwrap(), d(2024, 1, 15));
        assert_eq!(parse_ledger_date("2024-01-15 00:00:00", &formats).unwrap(), d(2024, 1, 15));
        assert_eq!(parse_ledger_date("Jan 15, 2024", &formats).unwrap(), d(2024, 1, 15));
        assert!(parse_ledger_date("15.01.2024", &formats).is_err());
    }

    #[test]
    fn date_format_override() {
        let opts = NormalizeOptions::default().with_date_formats_csv("%d.%m.%Y, ");
        assert_eq!(opts.date_formats, vec!["%d.%m.%Y".to_string()]);
        assert_eq!(parse_ledger_date("15.01.2024", &opts.date_formats).unwrap(), d(2024, 1, 15));

        let unchanged = NormalizeOptions::default().with_date_formats_csv(" , ");
        assert_eq!(unchanged, NormalizeOptions::default());
    }
}
