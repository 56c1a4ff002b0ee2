//! Seam to the external change-point detection algorithm

use super::series::SeriesKey;
use async_trait::async_trait;

/// Recomputes statistics over one mainline series.
#[async_trait]
pub trait SignalProcessor: Send + Sync {
    async fn recalculate(&self, series: &SeriesKey) -> anyhow::Result<()>;
}

/// Records the request and does nothing else. Used when no detection
/// service is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSignalProcessor;

#[async_trait]
impl SignalProcessor for LoggingSignalProcessor {
    async fn recalculate(&self, series: &SeriesKey) -> anyhow::Result<()> {
        tracing::info!(series = %series, "Signal processing recalculation requested");
        Ok(())
    }
}
