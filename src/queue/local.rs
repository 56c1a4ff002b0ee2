//! In-process job queue with a bounded worker pool.
//!
//! ## Design
//!
//! - `put` records the job id and pushes the job onto an unbounded mpsc
//!   channel; an id is rejected while a job with that id is pending or
//!   running, and released once it finishes
//! - `start` spawns one dispatcher task that pulls jobs off the channel and
//!   runs each on its own task, at most `workers` at a time (semaphore)
//! - jobs submitted before `start` wait in the channel
//! - dropping the queue or calling `close` stops dispatch

use super::traits::{Job, JobQueue, QueueError, QueueStats};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobStatus {
    Pending,
    Running,
}

#[derive(Default)]
struct State {
    /// In-flight jobs only
    jobs: HashMap<String, JobStatus>,
    stats: QueueStats,
}

struct Inner {
    workers: usize,
    capacity: usize,
    state: Mutex<State>,
    sender: mpsc::UnboundedSender<Arc<dyn Job>>,
    receiver: tokio::sync::Mutex<Option<mpsc::UnboundedReceiver<Arc<dyn Job>>>>,
    started: AtomicBool,
    shutdown: CancellationToken,
    idle: Notify,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        // Counters are updated one at a time, so a poisoned lock is still valid
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn mark_running(&self, id: &str) {
        let mut state = self.state();
        state.jobs.insert(id.to_string(), JobStatus::Running);
        state.stats.pending = state.stats.pending.saturating_sub(1);
        state.stats.running += 1;
    }

    fn mark_finished(&self, id: &str, ok: bool) {
        let idle = {
            let mut state = self.state();
            if ok {
                state.stats.completed += 1;
            } else {
                state.stats.failed += 1;
            }
            state.jobs.remove(id);
            state.stats.running = state.stats.running.saturating_sub(1);
            state.stats.is_idle()
        };
        if idle {
            self.idle.notify_waiters();
        }
    }

    async fn dispatch(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<Arc<dyn Job>>) {
        let permits = Arc::new(Semaphore::new(self.workers.max(1)));
        loop {
            let job = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                job = rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            let permit = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            self.mark_running(job.id());
            let inner = self.clone();
            tokio::spawn(async move {
                let result = job.run().await;
                if let Err(ref e) = result {
                    warn!(job_id = %job.id(), job_type = job.job_type(), error = %e, "Job failed");
                } else {
                    debug!(job_id = %job.id(), job_type = job.job_type(), "Job completed");
                }
                inner.mark_finished(job.id(), result.is_ok());
                drop(permit);
            });
        }
        debug!("Local queue dispatcher stopped");
    }
}

/// Local limited-size queue
pub struct LocalQueue {
    inner: Arc<Inner>,
}

impl LocalQueue {
    /// `workers` concurrent jobs at most, `capacity` pending jobs at most.
    pub fn new(workers: usize, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                workers,
                capacity,
                state: Mutex::new(State::default()),
                sender,
                receiver: tokio::sync::Mutex::new(Some(receiver)),
                started: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
                idle: Notify::new(),
            }),
        }
    }

    /// Whether a job with `id` is pending or running
    pub fn contains(&self, id: &str) -> bool {
        self.inner.state().jobs.contains_key(id)
    }

    /// Wait until no job is pending or running.
    ///
    /// Never returns while jobs are pending on a queue that was not started.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.stats().is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Stop dispatching and refuse further submissions. Running jobs finish.
    pub fn close(&self) {
        self.inner.shutdown.cancel();
    }
}

impl Drop for LocalQueue {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}

#[async_trait]
impl JobQueue for LocalQueue {
    async fn put(&self, job: Arc<dyn Job>) -> Result<(), QueueError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(QueueError::Closed);
        }
        {
            let mut state = self.inner.state();
            if state.jobs.contains_key(job.id()) {
                return Err(QueueError::Duplicate(job.id().to_string()));
            }
            if state.stats.pending >= self.inner.capacity {
                return Err(QueueError::Full {
                    capacity: self.inner.capacity,
                });
            }
            state.jobs.insert(job.id().to_string(), JobStatus::Pending);
            state.stats.total += 1;
            state.stats.pending += 1;
        }
        debug!(job_id = %job.id(), job_type = job.job_type(), "Job accepted");
        self.inner.sender.send(job).map_err(|_| QueueError::Closed)
    }

    fn stats(&self) -> QueueStats {
        self.inner.state().stats
    }

    async fn start(&self) -> Result<(), QueueError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(QueueError::Closed);
        }
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let receiver = self.inner.receiver.lock().await.take();
        match receiver {
            Some(rx) => {
                tokio::spawn(self.inner.clone().dispatch(rx));
                debug!(workers = self.inner.workers, "Local queue started");
                Ok(())
            }
            None => Err(QueueError::Closed),
        }
    }

    fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }
}
