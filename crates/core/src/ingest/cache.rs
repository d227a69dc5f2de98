use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::Result;

/// Single-value cache for a remote fetch. Values older than the TTL are
/// fetched again; failed fetches leave the cache untouched.
#[derive(Debug)]
pub struct FetchCache<T> {
    ttl: Duration,
    slot: tokio::sync::Mutex<Option<CachedValue<T>>>,
}

#[derive(Debug, Clone)]
struct CachedValue<T> {
    value: T,
    fetched_at: Instant,
}

impl<T: Clone> FetchCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: tokio::sync::Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached value, or runs `fetch` and caches its result.
    /// The lock is held while fetching, so concurrent callers wait for a
    /// single fetch.
    pub async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut guard = self.slot.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                tracing::debug!(
                    age_ms = cached.fetched_at.elapsed().as_millis(),
                    "fetch cache hit"
                );
                return Ok(cached.value.clone());
            }
        }

        tracing::debug!(ttl_secs = self.ttl.as_secs(), "fetch cache miss");
        let value = fetch().await?;
        *guard = Some(CachedValue {
            value: value.clone(),
            fetched_at: Instant::now(),
        });
        Ok(value)
    }

    pub async fn invalidate(&self) {
        let mut guard = self.slot.lock().await;
        if guard.take().is_some() {
            tracing::debug!("fetch cache invalidated");
        }
    }

    pub async fn is_populated(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}
