use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::Value;

use crate::config::Settings;
use crate::domain::table::RawTable;
use crate::ingest::source::LedgerSource;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 3;
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";
const DRIVE_BASE_URL: &str = "https://www.googleapis.com";

#[derive(Debug, Clone, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Clone, Deserialize)]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Reads the transaction worksheet of a Google spreadsheet.
///
/// The spreadsheet is either configured by id or resolved through a Drive
/// search query (first match wins).
#[derive(Debug, Clone)]
pub struct GoogleSheetsLedger {
    http: reqwest::Client,
    sheets_base_url: String,
    drive_base_url: String,
    api_key: Option<String>,
    access_token: Option<String>,
    spreadsheet_id: Option<String>,
    file_query: String,
    sheet_name: String,
    retries: u32,
}

impl GoogleSheetsLedger {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        anyhow::ensure!(
            settings.google_api_key.is_some() || settings.google_access_token.is_some(),
            "GOOGLE_API_KEY or GOOGLE_ACCESS_TOKEN is required"
        );

        let timeout_secs = std::env::var("SHEETS_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("SHEETS_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES)
            .max(1);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build sheets http client")?;

        Ok(Self {
            http,
            sheets_base_url: std::env::var("SHEETS_BASE_URL")
                .unwrap_or_else(|_| SHEETS_BASE_URL.to_string()),
            drive_base_url: std::env::var("DRIVE_BASE_URL")
                .unwrap_or_else(|_| DRIVE_BASE_URL.to_string()),
            api_key: settings.google_api_key.clone(),
            access_token: settings.google_access_token.clone(),
            spreadsheet_id: settings.ledger_spreadsheet_id.clone(),
            file_query: settings.ledger_file_query.clone(),
            sheet_name: settings.ledger_sheet_name.clone(),
            retries,
        })
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.access_token {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
        }
        Ok(headers)
    }

    fn key_query(&self) -> Vec<(&'static str, String)> {
        self.api_key
            .iter()
            .map(|k| ("key", k.clone()))
            .collect()
    }

    async fn get_json(&self, url: &str, query: &[(&'static str, String)]) -> Result<Value> {
        let res = self
            .http
            .get(url)
            .headers(self.headers()?)
            .query(query)
            .query(&self.key_query())
            .send()
            .await
            .context("google api request failed")?;

        let status = res.status();
        let text = res.text().await.context("failed to read google api response")?;
        let raw_json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("google api response is not valid JSON: {text}"))?;

        if !status.is_success() {
            anyhow::bail!("google api HTTP {status}: {raw_json}");
        }
        Ok(raw_json)
    }

    async fn resolve_spreadsheet_id(&self) -> Result<String> {
        if let Some(id) = &self.spreadsheet_id {
            return Ok(id.clone());
        }

        let url = format!("{}/drive/v3/files", self.drive_base_url.trim_end_matches('/'));
        let raw = self
            .get_json(
                &url,
                &[
                    ("q", self.file_query.clone()),
                    ("fields", "files(id,name)".to_string()),
                ],
            )
            .await?;
        let list = serde_json::from_value::<DriveFileList>(raw)
            .context("failed to parse drive file list")?;
        first_file_id(list, &self.file_query)
    }

    async fn fetch_once(&self) -> Result<RawTable> {
        let spreadsheet_id = self.resolve_spreadsheet_id().await?;
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.sheets_base_url.trim_end_matches('/'),
            spreadsheet_id,
            self.sheet_name
        );
        let raw = self.get_json(&url, &[]).await?;
        parse_value_range(raw)
    }
}

#[async_trait::async_trait]
impl LedgerSource for GoogleSheetsLedger {
    fn source_name(&self) -> &'static str {
        "google_sheets"
    }

    async fn fetch_ledger(&self) -> Result<RawTable> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let t0 = std::time::Instant::now();
            match self.fetch_once().await {
                Ok(table) => {
                    tracing::debug!(
                        sheet = %self.sheet_name,
                        rows = table.len(),
                        elapsed_ms = t0.elapsed().as_millis(),
                        "fetched ledger worksheet"
                    );
                    return Ok(table);
                }
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = retry_backoff(attempt);
                    tracing::warn!(
                        attempt,
                        ?backoff,
                        error = %err,
                        "ledger fetch failed; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// 1s, 2s, 4s, ... after each failed attempt, capped at `MAX_BACKOFF`.
fn retry_backoff(attempt: u32) -> Duration {
    let secs = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_secs(secs).min(MAX_BACKOFF)
}

fn first_file_id(list: DriveFileList, query: &str) -> Result<String> {
    let file = list
        .files
        .into_iter()
        .next()
        .with_context(|| format!("no spreadsheet matches drive query {query:?}"))?;
    tracing::debug!(id = %file.id, name = %file.name, "resolved ledger spreadsheet");
    Ok(file.id)
}

/// Converts a Sheets `values` response into a table. Formatted values are
/// strings already; anything else is rendered as its JSON text.
fn parse_value_range(raw: Value) -> Result<RawTable> {
    let range = serde_json::from_value::<ValueRange>(raw).context("failed to parse sheet values")?;
    let rows = range
        .values
        .into_iter()
        .map(|row| row.into_iter().map(cell_to_string).collect())
        .collect();
    Ok(RawTable::from_rows_with_header(rows))
}

fn cell_to_string(cell: Value) -> String {
    match cell {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn backoff_doubles_and_saturates() {
        assert_eq!(retry_backoff(1), Duration::from_secs(1));
        assert_eq!(retry_backoff(2), Duration::from_secs(2));
        assert_eq!(retry_backoff(4), Duration::from_secs(8));
        assert_eq!(retry_backoff(64), MAX_BACKOFF);
        assert_eq!(retry_backoff(u32::MAX), MAX_BACKOFF);
    }

    #[test]
    fn parses_formatted_value_range() {
        let raw = json!({
            "range": "Transactions!A1:E3",
            "majorDimension": "ROWS",
            "values": [
                ["Date", "Type", "Stock", "Transacted Value"],
                ["1/15/2024", "Div", "KO", "$10.00"],
                ["2/20/2024", "Buy", "KO"]
            ]
        });
        let table = parse_value_range(raw).unwrap();
        assert_eq!(table.columns, vec!["Date", "Type", "Stock", "Transacted Value"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 3), "$10.00");
        assert_eq!(table.cell(1, 3), "");
    }

    #[test]
    fn empty_sheet_has_no_values_key() {
        let table = parse_value_range(json!({"range": "Transactions!A1:Z1000"})).unwrap();
        assert!(table.is_empty());
        assert!(table.columns.is_empty());
    }

    #[test]
    fn non_string_cells_are_stringified() {
        assert_eq!(cell_to_string(json!(12.5)), "12.5");
        assert_eq!(cell_to_string(json!(null)), "");
        assert_eq!(cell_to_string(json!("Div")), "Div");
    }

    #[test]
    fn drive_lookup_takes_first_match() {
        let list: DriveFileList = serde_json::from_value(json!({
            "files": [{"id": "abc", "name": "CTO 2024"}, {"id": "def", "name": "CTO old"}]
        }))
        .unwrap();
        assert_eq!(first_file_id(list, "name contains 'CTO'").unwrap(), "abc");

        let empty: DriveFileList = serde_json::from_value(json!({})).unwrap();
        assert!(first_file_id(empty, "name contains 'CTO'").is_err());
    }
}
