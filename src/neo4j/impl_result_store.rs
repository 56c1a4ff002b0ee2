//! ResultStore implementation for Neo4jClient

use super::client::Neo4jClient;
use crate::context::with_context;
use crate::error::{PerfError, Result};
use crate::model::{PerformanceResult, SaveOutcome};
use crate::signal_processing::{SeriesKey, SeriesUpdate};
use crate::store::ResultStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

#[async_trait]
impl ResultStore for Neo4jClient {
    async fn get(&self, ctx: &CancellationToken, id: &str) -> Result<Option<PerformanceResult>> {
        with_context(ctx, "get", self.query_timeout(), async {
            self.get_result(id)
                .await
                .map_err(|e| PerfError::upstream("get", format!("id={}", id), e))
        })
        .await
    }

    async fn upsert(
        &self,
        ctx: &CancellationToken,
        result: &PerformanceResult,
    ) -> Result<SaveOutcome> {
        with_context(ctx, "upsert", self.query_timeout(), async {
            self.upsert_result(result)
                .await
                .map_err(|e| PerfError::upstream("upsert", format!("id={}", result.id), e))
        })
        .await
    }

    async fn unanalyzed_series(&self, ctx: &CancellationToken) -> Result<Vec<SeriesUpdate>> {
        with_context(ctx, "unanalyzed_series", self.query_timeout(), async {
            self.get_unanalyzed_series()
                .await
                .map_err(|e| PerfError::upstream("unanalyzed_series", "", e))
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
        with_context(ctx, "mark_series_analyzed", self.query_timeout(), async {
            self.set_series_processed(series, up_to, processed_at)
                .await
                .map_err(|e| {
                    PerfError::upstream("mark_series_analyzed", format!("series={}", series), e)
                })
        })
        .await
    }
}
