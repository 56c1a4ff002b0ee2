//! Connector trait definition
//!
//! The facade every caller talks to. Implemented over Neo4j and over the
//! in-memory store; both satisfy the same contract suite.

use crate::error::Result;
use crate::model::PerformanceResult;
use crate::query::PerformanceOptions;
use crate::store::ResultStore;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait Connector: Send + Sync {
    /// Store used by `PerformanceResult::save_new`
    fn store(&self) -> &dyn ResultStore;

    /// `NotFound` if absent
    async fn find_performance_result_by_id(
        &self,
        ctx: &CancellationToken,
        id: &str,
    ) -> Result<PerformanceResult>;

    /// Remove a result and all of its transitive descendants.
    ///
    /// Returns the number of records removed, 0 when nothing existed.
    async fn remove_performance_result_by_id(
        &self,
        ctx: &CancellationToken,
        id: &str,
    ) -> Result<usize>;

    /// Filtered, ordered page of results.
    ///
    /// An empty page is `NotFound` when task id, task name or version was
    /// given.
    async fn find_performance_results(
        &self,
        ctx: &CancellationToken,
        opts: &PerformanceOptions,
    ) -> Result<Vec<PerformanceResult>>;

    /// The root followed by its descendants within `max_depth` hops, in
    /// level order. With `tags`, only descendants carrying one of them are
    /// returned.
    async fn find_performance_result_with_children(
        &self,
        ctx: &CancellationToken,
        id: &str,
        max_depth: usize,
        tags: &[String],
    ) -> Result<Vec<PerformanceResult>>;

    /// Enqueue one recalculation job per series with new results
    async fn schedule_signal_processing_recalculate_jobs(
        &self,
        ctx: &CancellationToken,
    ) -> Result<()>;
}
