//! In-memory connector
//!
//! Same contract as [`DbConnector`](super::DbConnector). Every call holds the
//! store lock once, so removal and traversal see a consistent snapshot.

use super::require_results;
use super::traits::Connector;
use crate::context::with_context;
use crate::error::{PerfError, Result};
use crate::lineage::LineageIndex;
use crate::model::PerformanceResult;
use crate::query::{apply, PerformanceOptions};
use crate::signal_processing::RecalculationScheduler;
use crate::store::{MemoryStore, ResultStore};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct MockConnector {
    store: Arc<MemoryStore>,
    scheduler: RecalculationScheduler,
}

impl MockConnector {
    /// `scheduler` should be built over the same `store`
    pub fn new(store: Arc<MemoryStore>, scheduler: RecalculationScheduler) -> Self {
        Self { store, scheduler }
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn store(&self) -> &dyn ResultStore {
        self.store.as_ref()
    }

    async fn find_performance_result_by_id(
        &self,
        ctx: &CancellationToken,
        id: &str,
    ) -> Result<PerformanceResult> {
        with_context(ctx, "find_performance_result_by_id", None, async {
            self.store
                .read()
                .await
                .get(id)
                .cloned()
                .ok_or_else(|| PerfError::not_found(format!("performance result '{}'", id)))
        })
        .await
    }

    async fn remove_performance_result_by_id(
        &self,
        ctx: &CancellationToken,
        id: &str,
    ) -> Result<usize> {
        with_context(ctx, "remove_performance_result_by_id", None, async {
            let mut results = self.store.write().await;
            let doomed = LineageIndex::from_results(results.values().cloned()).descendants(id);
            let removed = doomed
                .iter()
                .filter(|id| results.remove(id.as_str()).is_some())
                .count();
            debug!(id = %id, removed, "Removed performance result subtree");
            Ok(removed)
        })
        .await
    }

    async fn find_performance_results(
        &self,
        ctx: &CancellationToken,
        opts: &PerformanceOptions,
    ) -> Result<Vec<PerformanceResult>> {
        with_context(ctx, "find_performance_results", None, async {
            let page = apply(opts, self.store.read().await.values().cloned());
            debug!(filter = %opts.describe(), count = page.len(), "Found performance results");
            require_results(opts, page)
        })
        .await
    }

    async fn find_performance_result_with_children(
        &self,
        ctx: &CancellationToken,
        id: &str,
        max_depth: usize,
        tags: &[String],
    ) -> Result<Vec<PerformanceResult>> {
        with_context(ctx, "find_performance_result_with_children", None, async {
            let results = self.store.read().await;
            LineageIndex::from_results(results.values().cloned()).traverse(id, max_depth, tags)
        })
        .await
    }

    async fn schedule_signal_processing_recalculate_jobs(
        &self,
        ctx: &CancellationToken,
    ) -> Result<()> {
        self.scheduler.schedule(ctx).await.map(|_| ())
    }
}
