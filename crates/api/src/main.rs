use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use homedash_core::domain::table::RawTable;
use homedash_core::error::PipelineError;
use homedash_core::ingest::cache::FetchCache;
use homedash_core::ingest::sheets::GoogleSheetsLedger;
use homedash_core::ingest::source::{BiometricSource, LedgerSource};
use homedash_core::ingest::stats::PgBiometricSource;
use homedash_core::pages::finance::{load_finance_page, FinancePage};
use homedash_core::pages::health::{load_health_page, HealthPage};
use homedash_core::pipeline::aggregate::Granularity;
use homedash_core::pipeline::normalize::NormalizeOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = homedash_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let ledger: Option<Arc<dyn LedgerSource>> = match GoogleSheetsLedger::from_settings(&settings) {
        Ok(source) => Some(Arc::new(source)),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "ledger source unavailable; finance page disabled");
            None
        }
    };

    let biometrics: Option<Arc<dyn BiometricSource>> =
        match PgBiometricSource::connect(&settings).await {
            Ok(source) => Some(Arc::new(source)),
            Err(e) => {
                sentry_anyhow::capture_anyhow(&e);
                tracing::error!(error = %e, "biometric database unavailable; health page disabled");
                None
            }
        };

    let state = AppState {
        ledger,
        ledger_cache: Arc::new(FetchCache::new(settings.ledger_cache_ttl)),
        biometrics,
        normalize: Arc::new(settings.normalize_options()),
        utc_offset_minutes: settings.utc_offset_minutes,
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/finance", get(get_finance_page))
        .route("/finance/cache/invalidate", post(invalidate_ledger_cache))
        .route("/health", get(get_health_page))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    ledger: Option<Arc<dyn LedgerSource>>,
    ledger_cache: Arc<FetchCache<RawTable>>,
    biometrics: Option<Arc<dyn BiometricSource>>,
    normalize: Arc<NormalizeOptions>,
    utc_offset_minutes: i32,
}

#[derive(Debug, Deserialize)]
struct FinanceQuery {
    scale: Option<String>,
    today: Option<String>,
}

type ApiError = (StatusCode, String);

async fn get_finance_page(
    State(state): State<AppState>,
    Query(query): Query<FinanceQuery>,
) -> Result<Json<FinancePage>, ApiError> {
    let Some(ledger) = &state.ledger else {
        return Err((StatusCode::SERVICE_UNAVAILABLE, "ledger source not configured".into()));
    };

    let scale = match query.scale.as_deref() {
        Some(s) => s
            .parse::<Granularity>()
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?,
        None => Granularity::Monthly,
    };
    let today = homedash_core::time::calendar::resolve_today(
        query.today.as_deref(),
        chrono::Utc::now(),
        state.utc_offset_minutes,
    )
    .map_err(|e| (StatusCode::BAD_REQUEST, format!("{e:#}")))?;

    let page = load_finance_page(
        ledger.as_ref(),
        &state.ledger_cache,
        scale,
        today,
        &state.normalize,
    )
    .await
    .map_err(map_page_error)?;

    Ok(Json(page))
}

async fn invalidate_ledger_cache(State(state): State<AppState>) -> StatusCode {
    state.ledger_cache.invalidate().await;
    tracing::info!(
        ttl_secs = state.ledger_cache.ttl().as_secs(),
        "ledger cache invalidated"
    );
    StatusCode::NO_CONTENT
}

async fn get_health_page(State(state): State<AppState>) -> Result<Json<HealthPage>, ApiError> {
    let Some(biometrics) = &state.biometrics else {
        return Err((StatusCode::SERVICE_UNAVAILABLE, "biometric database not configured".into()));
    };

    let page = load_health_page(biometrics.as_ref())
        .await
        .map_err(map_page_error)?;

    Ok(Json(page))
}

/// Pipeline failures are data problems and go back to the caller verbatim;
/// anything else is reported.
fn map_page_error(err: anyhow::Error) -> ApiError {
    if let Some(pipeline_err) = err.downcast_ref::<PipelineError>() {
        tracing::warn!(error = %pipeline_err, "page pipeline rejected source data");
        return (StatusCode::UNPROCESSABLE_ENTITY, pipeline_err.to_string());
    }

    sentry_anyhow::capture_anyhow(&err);
    tracing::error!(error = %err, "page load failed");
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &homedash_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_errors_map_to_unprocessable() {
        let err = anyhow::Error::new(PipelineError::MalformedCurrency { value: "$x".into() })
            .context("failed to build finance page");
        let (status, body) = map_page_error(err);
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.contains("$x"));
    }

    #[tokio::test]
    async fn invalidate_clears_the_ledger_cache() {
        let cache = Arc::new(FetchCache::new(std::time::Duration::from_secs(3600)));
        cache
            .get_or_fetch(|| async { Ok(RawTable::default()) })
            .await
            .unwrap();
        assert!(cache.is_populated().await);

        let state = AppState {
            ledger: None,
            ledger_cache: cache.clone(),
            biometrics: None,
            normalize: Arc::new(NormalizeOptions::default()),
            utc_offset_minutes: 0,
        };
        assert_eq!(invalidate_ledger_cache(State(state)).await, StatusCode::NO_CONTENT);
        assert!(!cache.is_populated().await);
        assert_eq!(cache.ttl(), std::time::Duration::from_secs(3600));
    }

    #[test]
    fn other_errors_map_to_internal() {
        let (status, _) = map_page_error(anyhow::anyhow!("connection reset"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
