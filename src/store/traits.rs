//! ResultStore trait definition
//!
//! The write and bookkeeping surface that models and jobs use. Implemented
//! by the Neo4j client and by the in-memory store; handles are injected at
//! construction, nothing is reached through a process-wide environment.

use crate::error::Result;
use crate::model::{PerformanceResult, SaveOutcome};
use crate::signal_processing::{SeriesKey, SeriesUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Load a result by identity
    async fn get(&self, ctx: &CancellationToken, id: &str) -> Result<Option<PerformanceResult>>;

    /// Insert or overwrite by identity, keeping the first stored `created_at`.
    /// Stamps a fresh `updated_at` revision and stores the submitted
    /// `processed_at`, so a plain re-submission reopens the result for
    /// analysis.
    async fn upsert(&self, ctx: &CancellationToken, result: &PerformanceResult)
        -> Result<SaveOutcome>;

    /// Mainline series holding results with rollups that signal processing
    /// has not consumed yet, sorted by series key
    async fn unanalyzed_series(&self, ctx: &CancellationToken) -> Result<Vec<SeriesUpdate>>;

    /// Stamp `processed_at` on every result of `series` whose revision is at
    /// or before `up_to`. Returns the number of results updated.
    async fn mark_series_analyzed(
        &self,
        ctx: &CancellationToken,
        series: &SeriesKey,
        up_to: DateTime<Utc>,
        processed_at: DateTime<Utc>,
    ) -> Result<usize>;
}
