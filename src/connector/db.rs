//! Neo4j-backed connector

use super::require_results;
use super::traits::Connector;
use crate::context::with_context;
use crate::error::{PerfError, Result};
use crate::lineage::LineageIndex;
use crate::model::PerformanceResult;
use crate::neo4j::Neo4jClient;
use crate::query::PerformanceOptions;
use crate::signal_processing::RecalculationScheduler;
use crate::store::ResultStore;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct DbConnector {
    client: Arc<Neo4jClient>,
    scheduler: RecalculationScheduler,
}

impl DbConnector {
    pub fn new(client: Arc<Neo4jClient>, scheduler: RecalculationScheduler) -> Self {
        Self { client, scheduler }
    }
}

#[async_trait]
impl Connector for DbConnector {
    fn store(&self) -> &dyn ResultStore {
        self.client.as_ref()
    }

    async fn find_performance_result_by_id(
        &self,
        ctx: &CancellationToken,
        id: &str,
    ) -> Result<PerformanceResult> {
        const OP: &str = "find_performance_result_by_id";
        with_context(ctx, OP, self.client.query_timeout(), async {
            self.client
                .get_result(id)
                .await
                .map_err(|e| PerfError::upstream(OP, format!("id={}", id), e))?
                .ok_or_else(|| PerfError::not_found(format!("performance result '{}'", id)))
        })
        .await
    }

    /// Not transactional: the subtree is collected first, then deleted in one
    /// statement. A child inserted in between survives; re-running the
    /// removal picks it up.
    async fn remove_performance_result_by_id(
        &self,
        ctx: &CancellationToken,
        id: &str,
    ) -> Result<usize> {
        const OP: &str = "remove_performance_result_by_id";
        with_context(ctx, OP, self.client.query_timeout(), async {
            let subtree = self
                .client
                .get_subtree(id, usize::MAX)
                .await
                .map_err(|e| PerfError::upstream(OP, format!("id={}", id), e))?;
            let doomed = LineageIndex::from_results(subtree).descendants(id);
            let removed = self
                .client
                .delete_results(&doomed)
                .await
                .map_err(|e| PerfError::upstream(OP, format!("id={}", id), e))?;
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
        const OP: &str = "find_performance_results";
        with_context(ctx, OP, self.client.query_timeout(), async {
            let page = self
                .client
                .find_results(opts)
                .await
                .map_err(|e| PerfError::upstream(OP, opts.describe(), e))?;
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
        const OP: &str = "find_performance_result_with_children";
        with_context(ctx, OP, self.client.query_timeout(), async {
            let subtree = self
                .client
                .get_subtree(id, max_depth)
                .await
                .map_err(|e| {
                    PerfError::upstream(OP, format!("id={} max_depth={}", id, max_depth), e)
                })?;
            LineageIndex::from_results(subtree).traverse(id, max_depth, tags)
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
