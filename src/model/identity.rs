//! Content-based identity for performance results
//!
//! The identity is a pure function of the fields that name an observation,
//! so re-submitting the same observation overwrites instead of duplicating,
//! and a child can reference its parent's identity before the parent is
//! stored.

use super::result::PerformanceResultInfo;
use sha2::{Digest, Sha256};

/// Compute the identity of a result from its identifying fields.
///
/// Includes: project, version, variant, task id, test name.
/// Ignores: task name, order, tags, mainline, parent.
pub fn identity(info: &PerformanceResultInfo) -> String {
    let mut hasher = Sha256::new();
    for field in [
        &info.project,
        &info.version,
        &info.variant,
        &info.task_id,
        &info.test_name,
    ] {
        // Length prefix keeps ("ab", "c") and ("a", "bc") apart
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}
