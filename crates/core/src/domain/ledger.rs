use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const DIVIDEND_TYPE: &str = "Div";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryType {
    Dividend,
    Other(String),
}

impl EntryType {
    pub fn parse(s: &str) -> Self {
        if s == DIVIDEND_TYPE {
            Self::Dividend
        } else {
            Self::Other(s.to_string())
        }
    }

    pub fn is_dividend(&self) -> bool {
        matches!(self, Self::Dividend)
    }
}

/// One ledger row before any parsing: the date and value are still the
/// spreadsheet's formatted strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub date: String,
    pub entry_type: EntryType,
    pub stock: String,
    pub transacted_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DividendRecord {
    pub date: NaiveDate,
    pub stock: String,
    pub amount: Decimal,
}
