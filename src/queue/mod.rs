//! Job queue capability used to run background recalculation
//!
//! The scheduler depends only on [`JobQueue`]: submit with a caller-assigned
//! id, query statistics, start. [`LocalQueue`] is the in-process
//! implementation with a bounded worker pool.

pub mod local;
pub mod traits;

pub use local::LocalQueue;
pub use traits::{Job, JobQueue, QueueError, QueueStats};
