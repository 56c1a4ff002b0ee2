//! Series: the grouping over which mainline history is analyzed

use crate::model::PerformanceResultInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinates of a mainline series
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub project: String,
    pub variant: String,
    pub task_name: String,
    pub test_name: String,
}

impl SeriesKey {
    pub fn of(info: &PerformanceResultInfo) -> Self {
        Self {
            project: info.project.clone(),
            variant: info.variant.clone(),
            task_name: info.task_name.clone(),
            test_name: info.test_name.clone(),
        }
    }

    pub fn contains(&self, info: &PerformanceResultInfo) -> bool {
        self.project == info.project
            && self.variant == info.variant
            && self.task_name == info.task_name
            && self.test_name == info.test_name
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.project, self.variant, self.task_name, self.test_name
        )
    }
}

/// A series with unanalyzed results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesUpdate {
    pub key: SeriesKey,
    /// Newest write revision (`updated_at`) among the unanalyzed results
    pub revision: DateTime<Utc>,
}
