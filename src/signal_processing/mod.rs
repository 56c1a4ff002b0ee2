//! Signal-processing recalculation scheduling
//!
//! Detects mainline series with results the change-point analysis has not
//! seen yet and enqueues one idempotent job per series. The statistical
//! algorithm itself sits behind [`SignalProcessor`].

pub mod job;
pub mod processor;
pub mod scheduler;
pub mod series;

pub use job::{RecalculateJob, RECALCULATE_JOB_TYPE};
pub use processor::{LoggingSignalProcessor, SignalProcessor};
pub use scheduler::RecalculationScheduler;
pub use series::{SeriesKey, SeriesUpdate};
