//! Test helper factories
//!
//! Convenience functions for creating results with sensible defaults.
#![allow(dead_code)]

use crate::model::{MetricType, PerfRollupValue, PerformanceResult, PerformanceResultInfo};
use chrono::{Duration, Utc};

/// Mainline info with the identifying fields set
pub fn test_info(project: &str, version: &str, task_id: &str) -> PerformanceResultInfo {
    PerformanceResultInfo {
        project: project.to_string(),
        version: version.to_string(),
        task_id: task_id.to_string(),
        task_name: format!("{}-name", task_id),
        mainline: true,
        ..Default::default()
    }
}

/// Root result without rollups or artifacts
pub fn test_result(project: &str, version: &str, task_id: &str) -> PerformanceResult {
    PerformanceResult::create(test_info(project, version, task_id), vec![], vec![])
}

/// Child of `parent` in the same project and version
pub fn child_of(parent: &PerformanceResult, task_id: &str, tags: &[&str]) -> PerformanceResult {
    let mut info = test_info(&parent.info.project, &parent.info.version, task_id);
    info.parent = parent.id.clone();
    info.tags = tags.iter().map(|t| t.to_string()).collect();
    PerformanceResult::create(info, vec![], vec![])
}

fn sum(name: &str, value: f64) -> PerfRollupValue {
    PerfRollupValue::new(name, MetricType::Sum, 0, value)
}

fn rollup_result(series: u8, version: &str, order: i64) -> PerformanceResult {
    let info = PerformanceResultInfo {
        project: format!("rollup{}project", series),
        variant: format!("rollup{}variant", series),
        version: version.to_string(),
        order,
        test_name: format!("rollup{}test", series),
        task_name: format!("rollup{}task", series),
        task_id: format!("rollup{}task", series),
        mainline: true,
        ..Default::default()
    };
    PerformanceResult::create(
        info,
        vec![],
        vec![sum("OverheadTotal", 100.0), sum("OperationsTotal", 10000.0)],
    )
    .with_created_at(Utc::now() - Duration::seconds(1))
}

/// Three mainline results with rollups spread over two series
pub fn rollup_fixture() -> Vec<PerformanceResult> {
    vec![
        rollup_result(1, "0r", 1),
        rollup_result(2, "0r", 1),
        rollup_result(1, "1r", 2),
    ]
}
