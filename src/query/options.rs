//! Filter options and their in-memory evaluation

use crate::model::{PerformanceResult, TimeRange};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Filters for `find_performance_results`, combined with logical AND.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceOptions {
    pub task_id: Option<String>,
    /// Also restricts results to mainline builds
    pub task_name: Option<String>,
    pub version: Option<String>,
    pub variant: Option<String>,
    /// Matches when a result carries any of these tags
    pub tags: Vec<String>,
    pub interval: Option<TimeRange>,
    pub limit: Option<usize>,
    pub skip: usize,
}

impl PerformanceOptions {
    pub fn by_task_id(task_id: impl Into<String>) -> Self {
        Self {
            task_id: Some(task_id.into()),
            ..Default::default()
        }
    }

    pub fn by_task_name(task_name: impl Into<String>) -> Self {
        Self {
            task_name: Some(task_name.into()),
            ..Default::default()
        }
    }

    pub fn by_version(version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            ..Default::default()
        }
    }

    /// True if a known coordinate was supplied, in which case an empty page
    /// is reported as `NotFound`.
    pub fn has_positive_filter(&self) -> bool {
        self.task_id.is_some() || self.task_name.is_some() || self.version.is_some()
    }

    /// Ordering is newest build first when browsing a task's history.
    pub fn orders_by_build(&self) -> bool {
        self.task_name.is_some()
    }

    pub fn matches(&self, result: &PerformanceResult) -> bool {
        let info = &result.info;
        if let Some(ref task_id) = self.task_id {
            if &info.task_id != task_id {
                return false;
            }
        }
        if let Some(ref task_name) = self.task_name {
            if &info.task_name != task_name || !info.mainline {
                return false;
            }
        }
        if let Some(ref version) = self.version {
            if &info.version != version {
                return false;
            }
        }
        if let Some(ref variant) = self.variant {
            if &info.variant != variant {
                return false;
            }
        }
        if !self.tags.is_empty() && !info.has_any_tag(&self.tags) {
            return false;
        }
        if let Some(ref interval) = self.interval {
            if !interval.contains(result.created_at) {
                return false;
            }
        }
        true
    }

    /// Order results the way the persistent backend's `ORDER BY` does.
    pub fn sort(&self, results: &mut [PerformanceResult]) {
        if self.orders_by_build() {
            results.sort_by(|a, b| match b.info.order.cmp(&a.info.order) {
                Ordering::Equal => a.id.cmp(&b.id),
                other => other,
            });
        } else {
            results.sort_by(|a, b| a.id.cmp(&b.id));
        }
    }

    /// Apply `skip` then `limit` to an ordered sequence.
    pub fn paginate(&self, results: Vec<PerformanceResult>) -> Vec<PerformanceResult> {
        let limit = self.limit.unwrap_or(usize::MAX);
        results.into_iter().skip(self.skip).take(limit).collect()
    }

    /// Short description of the filter values for logs and error context
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(ref v) = self.task_id {
            parts.push(format!("task_id={}", v));
        }
        if let Some(ref v) = self.task_name {
            parts.push(format!("task_name={}", v));
        }
        if let Some(ref v) = self.version {
            parts.push(format!("version={}", v));
        }
        if let Some(ref v) = self.variant {
            parts.push(format!("variant={}", v));
        }
        if !self.tags.is_empty() {
            parts.push(format!("tags={}", self.tags.join(",")));
        }
        if let Some(ref r) = self.interval {
            parts.push(format!("interval={}..{}", r.start().to_rfc3339(), r.end().to_rfc3339()));
        }
        if let Some(limit) = self.limit {
            parts.push(format!("limit={}", limit));
        }
        if self.skip > 0 {
            parts.push(format!("skip={}", self.skip));
        }
        if parts.is_empty() {
            "no filters".to_string()
        } else {
            parts.join(" ")
        }
    }
}

/// Filter, order and paginate an in-memory snapshot.
pub fn apply(
    opts: &PerformanceOptions,
    results: impl IntoIterator<Item = PerformanceResult>,
) -> Vec<PerformanceResult> {
    let mut matched: Vec<PerformanceResult> =
        results.into_iter().filter(|r| opts.matches(r)).collect();
    opts.sort(&mut matched);
    opts.paginate(matched)
}
