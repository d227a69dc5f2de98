use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use homedash_core::config::Settings;
use homedash_core::ingest::cache::FetchCache;
use homedash_core::ingest::csv_file::CsvLedger;
use homedash_core::ingest::sheets::GoogleSheetsLedger;
use homedash_core::ingest::source::LedgerSource;
use homedash_core::ingest::stats::PgBiometricSource;
use homedash_core::pipeline::aggregate::Granularity;

#[derive(Debug, Parser)]
#[command(name = "homedash_worker")]
struct Args {
    /// Indent the JSON output.
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    page: Page,
}

#[derive(Debug, Subcommand)]
enum Page {
    /// Dividend buckets and trend.
    Finance {
        /// monthly or yearly.
        #[arg(long, default_value_t = Granularity::Monthly)]
        scale: Granularity,

        /// Treat this date (YYYY-MM-DD) as today. Defaults to the configured local date.
        #[arg(long)]
        today: Option<String>,

        /// Read the ledger from a CSV export instead of Google Sheets.
        #[arg(long)]
        ledger_csv: Option<PathBuf>,
    },
    /// Resting heart rate, stress and calories.
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let result = run(&settings, &args).await;
    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %err, "page run failed");
    }
    result
}

async fn run(settings: &Settings, args: &Args) -> anyhow::Result<()> {
    let json = match &args.page {
        Page::Finance {
            scale,
            today,
            ledger_csv,
        } => {
            let today = homedash_core::time::calendar::resolve_today(
                today.as_deref(),
                chrono::Utc::now(),
                settings.utc_offset_minutes,
            )?;

            let source: Box<dyn LedgerSource> = match ledger_csv {
                Some(path) => Box::new(CsvLedger::new(path)),
                None => Box::new(GoogleSheetsLedger::from_settings(settings)?),
            };
            // One-shot run: the cache only matters for the API, but the entry point takes one.
            let cache = FetchCache::new(settings.ledger_cache_ttl);

            let page = homedash_core::pages::finance::load_finance_page(
                source.as_ref(),
                &cache,
                *scale,
                today,
                &settings.normalize_options(),
            )
            .await?;
            to_json(&page, args.pretty)?
        }
        Page::Health => {
            let source = PgBiometricSource::connect(settings).await?;
            let page = homedash_core::pages::health::load_health_page(&source).await?;
            to_json(&page, args.pretty)?
        }
    };

    println!("{json}");
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> anyhow::Result<String> {
    let out = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    out.context("failed to serialize page")
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
