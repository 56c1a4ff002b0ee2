//! Closed time windows over result creation timestamps

use crate::error::{PerfError, Result};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// A closed window `[start, end]`.
///
/// Bounds are truncated to millisecond precision, the resolution at which
/// both backends store and compare `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: start.trunc_subsecs(3),
            end: end.trunc_subsecs(3),
        }
    }

    /// Window of `duration` ending at `end`, or at now when `end` is `None`.
    ///
    /// Fails with `InvalidInput` when the start falls outside the
    /// representable range.
    pub fn lookback(end: Option<DateTime<Utc>>, duration: Duration) -> Result<Self> {
        let end = end.unwrap_or_else(Utc::now);
        let start = end.checked_sub_signed(duration).ok_or_else(|| {
            PerfError::InvalidInput(format!("lookback of {} is out of range", duration))
        })?;
        Ok(Self::new(start, end))
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }

    /// Bounds as epoch milliseconds, for the persistent backend
    pub fn bounds_ms(&self) -> (i64, i64) {
        (self.start.timestamp_millis(), self.end.timestamp_millis())
    }
}
