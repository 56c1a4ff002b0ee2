//! Fan-out of recalculation jobs onto the job queue

use super::job::RecalculateJob;
use super::processor::SignalProcessor;
use crate::error::{PerfError, Result};
use crate::queue::{Job, JobQueue, QueueError};
use crate::store::ResultStore;
use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Submits one job per series with unanalyzed results.
///
/// Does not wait for jobs to run. Submission is best effort: every job is
/// attempted and failures are reported together.
#[derive(Clone)]
pub struct RecalculationScheduler {
    store: Arc<dyn ResultStore>,
    queue: Arc<dyn JobQueue>,
    processor: Arc<dyn SignalProcessor>,
}

impl RecalculationScheduler {
    pub fn new(
        store: Arc<dyn ResultStore>,
        queue: Arc<dyn JobQueue>,
        processor: Arc<dyn SignalProcessor>,
    ) -> Self {
        Self {
            store,
            queue,
            processor,
        }
    }

    /// Returns the number of newly accepted jobs. Jobs the queue already
    /// holds are skipped silently.
    pub async fn schedule(&self, ctx: &CancellationToken) -> Result<usize> {
        let updates = self.store.unanalyzed_series(ctx).await?;
        if ctx.is_cancelled() {
            return Err(PerfError::Canceled { op: "schedule" });
        }

        let jobs: Vec<Arc<RecalculateJob>> = updates
            .into_iter()
            .map(|update| {
                Arc::new(RecalculateJob::new(
                    update,
                    self.store.clone(),
                    self.processor.clone(),
                ))
            })
            .collect();

        let outcomes = join_all(jobs.iter().map(|job| {
            let job: Arc<dyn Job> = job.clone();
            self.queue.put(job)
        }))
        .await;

        let mut accepted = 0;
        let mut errors = Vec::new();
        for (job, outcome) in jobs.iter().zip(outcomes) {
            match outcome {
                Ok(()) => accepted += 1,
                Err(QueueError::Duplicate(id)) => {
                    debug!(job_id = %id, series = %job.series(), "Recalculation already queued");
                }
                Err(e) => {
                    warn!(job_id = %job.id(), series = %job.series(), error = %e, "Failed to enqueue recalculation");
                    errors.push(PerfError::upstream(
                        "schedule",
                        format!("series={}", job.series()),
                        e.into(),
                    ));
                }
            }
        }

        info!(
            series = jobs.len(),
            accepted,
            failed = errors.len(),
            "Scheduled signal processing recalculation"
        );

        if errors.is_empty() {
            Ok(accepted)
        } else {
            Err(PerfError::Aggregate {
                op: "schedule",
                errors,
            })
        }
    }
}
