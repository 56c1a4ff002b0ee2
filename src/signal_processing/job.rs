//! Recalculation job for one series

use super::processor::SignalProcessor;
use super::series::{SeriesKey, SeriesUpdate};
use crate::queue::Job;
use crate::store::ResultStore;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const RECALCULATE_JOB_TYPE: &str = "signal-processing-recalculate";

/// Deterministic job id for a series at a given revision.
///
/// Re-scheduling before the queue drains produces the same id. Any save to
/// the series moves the revision and produces a new one.
pub fn job_id(update: &SeriesUpdate) -> String {
    let key = &update.key;
    let mut hasher = Sha256::new();
    for field in [
        key.project.as_str(),
        key.variant.as_str(),
        key.task_name.as_str(),
        key.test_name.as_str(),
    ] {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }
    hasher.update(
        update
            .revision
            .to_rfc3339_opts(SecondsFormat::Millis, true)
            .as_bytes(),
    );
    format!("{}.{}", RECALCULATE_JOB_TYPE, hex::encode(hasher.finalize()))
}

/// Runs the external processor over a series, then marks the results saved
/// at or before the job's revision as analyzed.
pub struct RecalculateJob {
    id: String,
    series: SeriesKey,
    up_to: DateTime<Utc>,
    store: Arc<dyn ResultStore>,
    processor: Arc<dyn SignalProcessor>,
}

impl RecalculateJob {
    pub fn new(
        update: SeriesUpdate,
        store: Arc<dyn ResultStore>,
        processor: Arc<dyn SignalProcessor>,
    ) -> Self {
        Self {
            id: job_id(&update),
            series: update.key,
            up_to: update.revision,
            store,
            processor,
        }
    }

    pub fn series(&self) -> &SeriesKey {
        &self.series
    }
}

#[async_trait]
impl Job for RecalculateJob {
    fn id(&self) -> &str {
        &self.id
    }

    fn job_type(&self) -> &'static str {
        RECALCULATE_JOB_TYPE
    }

    async fn run(&self) -> anyhow::Result<()> {
        self.processor.recalculate(&self.series).await?;
        let marked = self
            .store
            .mark_series_analyzed(&CancellationToken::new(), &self.series, self.up_to, Utc::now())
            .await?;
        tracing::debug!(series = %self.series, marked, "Series marked analyzed");
        Ok(())
    }
}
