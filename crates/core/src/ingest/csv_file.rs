use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::domain::table::RawTable;
use crate::ingest::source::LedgerSource;

/// A local CSV export of the transaction worksheet.
#[derive(Debug, Clone)]
pub struct CsvLedger {
    path: PathBuf,
}

impl CsvLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl LedgerSource for CsvLedger {
    fn source_name(&self) -> &'static str {
        "csv_file"
    }

    async fn fetch_ledger(&self) -> Result<RawTable> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read ledger csv {}", self.path.display()))?;
        parse_csv_ledger(&text)
            .with_context(|| format!("failed to parse ledger csv {}", self.path.display()))
    }
}

pub fn parse_csv_ledger(text: &str) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context("invalid csv record")?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(RawTable::from_rows_with_header(rows))
}
