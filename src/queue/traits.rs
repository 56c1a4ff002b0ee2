//! Job and queue trait definitions

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// A unit of background work with a caller-assigned unique id
#[async_trait]
pub trait Job: Send + Sync {
    /// Stable identifier; the queue refuses a second job with the same id
    /// while the first is pending or running
    fn id(&self) -> &str;

    /// Name of the job type, for logs and stats
    fn job_type(&self) -> &'static str;

    async fn run(&self) -> anyhow::Result<()>;
}

/// Counters over every job a queue has accepted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

impl QueueStats {
    /// No job is waiting or running
    pub fn is_idle(&self) -> bool {
        self.pending == 0 && self.running == 0
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    /// A job with this id is already pending or running
    #[error("job '{0}' already exists")]
    Duplicate(String),

    /// Too many pending jobs
    #[error("queue is full ({capacity} pending jobs)")]
    Full { capacity: usize },

    /// The queue was closed and accepts no more work
    #[error("queue is closed")]
    Closed,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Submit a job. Fails with `Duplicate` while a job with the same id is
    /// pending or running.
    async fn put(&self, job: Arc<dyn Job>) -> Result<(), QueueError>;

    fn stats(&self) -> QueueStats;

    /// Begin dispatching jobs. Calling it again is a no-op.
    async fn start(&self) -> Result<(), QueueError>;

    fn is_started(&self) -> bool;
}
