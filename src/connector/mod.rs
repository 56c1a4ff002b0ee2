//! Connector facade and its two backends

pub mod db;
pub mod mock;
pub mod traits;

pub use db::DbConnector;
pub use mock::MockConnector;
pub use traits::Connector;

use crate::error::{PerfError, Result};
use crate::model::PerformanceResult;
use crate::query::PerformanceOptions;

/// Empty pages for a known coordinate are reported as `NotFound`
pub(crate) fn require_results(
    opts: &PerformanceOptions,
    results: Vec<PerformanceResult>,
) -> Result<Vec<PerformanceResult>> {
    if results.is_empty() && opts.has_positive_filter() {
        return Err(PerfError::not_found(format!(
            "performance results matching {}",
            opts.describe()
        )));
    }
    Ok(results)
}
