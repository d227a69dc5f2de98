pub mod domain;
pub mod error;
pub mod ingest;
pub mod pages;
pub mod pipeline;
pub mod time;

pub mod config {
    use std::time::Duration;

    use anyhow::Context;

    use crate::pipeline::normalize::NormalizeOptions;

    const DEFAULT_LEDGER_FILE_QUERY: &str = "name contains 'CTO'";
    const DEFAULT_LEDGER_SHEET_NAME: &str = "Transactions";
    const DEFAULT_LEDGER_CACHE_TTL_SECS: u64 = 60 * 60 * 24 * 2;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub google_api_key: Option<String>,
        pub google_access_token: Option<String>,
        pub ledger_spreadsheet_id: Option<String>,
        pub ledger_file_query: String,
        pub ledger_sheet_name: String,
        pub ledger_cache_ttl: Duration,
        pub ledger_date_formats: Option<String>,
        pub utc_offset_minutes: i32,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let ledger_cache_ttl_secs = match non_empty_var("LEDGER_CACHE_TTL_SECS") {
                Some(s) => s.parse::<u64>().with_context(|| {
                    format!("LEDGER_CACHE_TTL_SECS must be an integer (got {s:?})")
                })?,
                None => DEFAULT_LEDGER_CACHE_TTL_SECS,
            };

            let utc_offset_minutes = match non_empty_var("DASHBOARD_UTC_OFFSET_MINUTES") {
                Some(s) => s.parse::<i32>().with_context(|| {
                    format!("DASHBOARD_UTC_OFFSET_MINUTES must be an integer (got {s:?})")
                })?,
                None => 0,
            };

            Ok(Self {
                database_url: non_empty_var("DATABASE_URL"),
                google_api_key: non_empty_var("GOOGLE_API_KEY"),
                google_access_token: non_empty_var("GOOGLE_ACCESS_TOKEN"),
                ledger_spreadsheet_id: non_empty_var("LEDGER_SPREADSHEET_ID"),
                ledger_file_query: non_empty_var("LEDGER_FILE_QUERY")
                    .unwrap_or_else(|| DEFAULT_LEDGER_FILE_QUERY.to_string()),
                ledger_sheet_name: non_empty_var("LEDGER_SHEET_NAME")
                    .unwrap_or_else(|| DEFAULT_LEDGER_SHEET_NAME.to_string()),
                ledger_cache_ttl: Duration::from_secs(ledger_cache_ttl_secs),
                ledger_date_formats: non_empty_var("LEDGER_DATE_FORMATS"),
                utc_offset_minutes,
                sentry_dsn: non_empty_var("SENTRY_DSN"),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn normalize_options(&self) -> NormalizeOptions {
            match self.ledger_date_formats.as_deref() {
                Some(formats) => NormalizeOptions::default().with_date_formats_csv(formats),
                None => NormalizeOptions::default(),
            }
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|s| !s.trim().is_empty())
    }
}
