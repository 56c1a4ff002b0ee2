//! In-memory result store.
//!
//! Backs the mock connector. Each operation takes the `tokio::sync::RwLock`
//! once, so a single connector call is atomic with respect to other calls.

use super::traits::ResultStore;
use crate::context::with_context;
use crate::error::Result;
use crate::model::result::next_revision;
use crate::model::{PerformanceResult, SaveOutcome};
use crate::signal_processing::{SeriesKey, SeriesUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio_util::sync::CancellationToken;

/// Results keyed by identity
#[derive(Debug, Default)]
pub struct MemoryStore {
    results: RwLock<HashMap<String, PerformanceResult>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed results directly, bypassing `save_new` (tests, fixtures).
    pub async fn with_results(self, results: impl IntoIterator<Item = PerformanceResult>) -> Self {
        {
            let mut map = self.results.write().await;
            for result in results {
                map.insert(result.id.clone(), result);
            }
        }
        self
    }

    pub async fn len(&self) -> usize {
        self.results.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.results.read().await.is_empty()
    }

    pub(crate) async fn read(&self) -> RwLockReadGuard<'_, HashMap<String, PerformanceResult>> {
        self.results.read().await
    }

    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, PerformanceResult>> {
        self.results.write().await
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn get(&self, ctx: &CancellationToken, id: &str) -> Result<Option<PerformanceResult>> {
        with_context(ctx, "get", None, async {
            Ok(self.results.read().await.get(id).cloned())
        })
        .await
    }

    async fn upsert(
        &self,
        ctx: &CancellationToken,
        result: &PerformanceResult,
    ) -> Result<SaveOutcome> {
        with_context(ctx, "upsert", None, async {
            let mut results = self.results.write().await;
            let existing = results.get(&result.id);
            let created = existing.is_none();
            let created_at = existing.map_or(result.created_at, |e| e.created_at);
            let updated_at = next_revision(existing.map(|e| e.updated_at), Utc::now());

            let mut stored = result.clone();
            stored.created_at = created_at;
            stored.updated_at = updated_at;
            results.insert(stored.id.clone(), stored);
            Ok(SaveOutcome {
                created,
                created_at,
                updated_at,
            })
        })
        .await
    }

    async fn unanalyzed_series(&self, ctx: &CancellationToken) -> Result<Vec<SeriesUpdate>> {
        with_context(ctx, "unanalyzed_series", None, async {
            let results = self.results.read().await;
            let mut latest: BTreeMap<SeriesKey, DateTime<Utc>> = BTreeMap::new();
            for result in results.values() {
                if !result.info.mainline || !result.needs_analysis() {
                    continue;
                }
                let entry = latest
                    .entry(SeriesKey::of(&result.info))
                    .or_insert(result.updated_at);
                if result.updated_at > *entry {
                    *entry = result.updated_at;
                }
            }
            Ok(latest
                .into_iter()
                .map(|(key, revision)| SeriesUpdate { key, revision })
                .collect())
        })
        .await
    }

    async fn mark_series_analyzed(
        &self,
        ctx: &CancellationToken,
        series: &SeriesKey,
        up_to: DateTime<Utc>,
        processed_at: DateTime<Utc>,
    ) -> Result<usize> {
        with_context(ctx, "mark_series_analyzed", None, async {
            let mut results = self.results.write().await;
            let mut count = 0;
            for result in results.values_mut() {
                if result.info.mainline
                    && result.updated_at <= up_to
                    && series.contains(&result.info)
                {
                    result.analysis.processed_at = Some(processed_at);
                    count += 1;
                }
            }
            Ok(count)
        })
        .await
    }
}
