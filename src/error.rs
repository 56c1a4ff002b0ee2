//! Error taxonomy shared by every connector and store.
//!
//! Drivers (Neo4j, the job queue) report `anyhow` errors internally; the
//! connector boundary classifies them into [`PerfError`] so callers can match
//! on the kind of failure instead of parsing messages.

use thiserror::Error;

/// Errors surfaced by the performance-result store.
#[derive(Debug, Error)]
pub enum PerfError {
    /// Record absent, or a filtered query on a known coordinate matched nothing.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// Identity collision with diverging immutable data.
    #[error("conflict on {id}: {reason}")]
    Conflict { id: String, reason: String },

    /// The caller's context was cancelled or its deadline elapsed.
    #[error("{op} canceled")]
    Canceled { op: &'static str },

    /// Backing store or job queue transport failure.
    #[error("{op} failed ({context}): {source}")]
    Upstream {
        op: &'static str,
        context: String,
        #[source]
        source: anyhow::Error,
    },

    /// Partial failure across a best-effort fan-out.
    #[error("{op}: {} of the submissions failed", errors.len())]
    Aggregate {
        op: &'static str,
        errors: Vec<PerfError>,
    },

    /// Caller supplied values that cannot be combined.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result alias used across the crate's public API.
pub type Result<T> = std::result::Result<T, PerfError>;

impl PerfError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Wrap a driver error with the operation name and the filter values
    /// needed to diagnose it.
    pub fn upstream(op: &'static str, context: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Upstream {
            op,
            context: context.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled { .. })
    }

    /// Removal and job submission are idempotent, so transport failures and
    /// cancellations can be retried blindly by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::Canceled { .. })
    }
}
