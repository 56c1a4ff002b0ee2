//! Cancellation and deadline handling for store operations

use crate::error::{PerfError, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Run `fut` bounded by the caller's token and an optional timeout.
///
/// The inner future is dropped on cancellation, so no partial result escapes.
pub async fn with_context<T, F>(
    ctx: &CancellationToken,
    op: &'static str,
    timeout: Option<Duration>,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if ctx.is_cancelled() {
        return Err(PerfError::Canceled { op });
    }

    let bounded = async {
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(res) => res,
                Err(_) => {
                    tracing::warn!(op, timeout_ms = limit.as_millis() as u64, "Operation timed out");
                    Err(PerfError::Canceled { op })
                }
            },
            None => fut.await,
        }
    };

    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(PerfError::Canceled { op }),
        res = bounded => res,
    }
}
