use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::{Dataset, NormalizedTable};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Clone)]
struct CacheEntry {
    table: Arc<NormalizedTable>,
    stored_at: Instant,
    computed_at: DateTime<Utc>,
}

/// Time-boxed store of preprocessed tables, one per dataset.
///
/// Concurrent misses for the same dataset each compute; the last writer wins.
pub struct DatasetCache {
    ttl: Duration,
    entries: RwLock<HashMap<Dataset, CacheEntry>>,
}

impl DatasetCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fresh cached table for `dataset`, or the result of `compute`. Errors are
    /// not cached.
    pub async fn get_or_compute<F, Fut>(&self, dataset: Dataset, compute: F) -> Result<Arc<NormalizedTable>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<NormalizedTable>>,
    {
        if let Some(table) = self.get(dataset).await {
            metrics::cache::hit(dataset.slug());
            return Ok(table);
        }

        metrics::cache::miss(dataset.slug());
        debug!(dataset = %dataset, "Cache miss, recomputing");
        let table = Arc::new(compute().await?);

        self.entries.write().await.insert(
            dataset,
            CacheEntry {
                table: table.clone(),
                stored_at: Instant::now(),
                computed_at: Utc::now(),
            },
        );
        Ok(table)
    }

    async fn get(&self, dataset: Dataset) -> Option<Arc<NormalizedTable>> {
        let entries = self.entries.read().await;
        entries
            .get(&dataset)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.table.clone())
    }

    /// When the cached table of `dataset` was computed, if one is still fresh.
    pub async fn computed_at(&self, dataset: Dataset) -> Option<DateTime<Utc>> {
        let entries = self.entries.read().await;
        entries
            .get(&dataset)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.computed_at)
    }
}
