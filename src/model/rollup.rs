//! Rollup metrics attached to a performance result

use crate::error::{PerfError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How raw per-run metrics were reduced into a single rollup value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Sum,
    MeanUnweighted,
    Max,
    Min,
    Median,
    Percentile99,
    Throughput,
    Latency,
}

impl MetricType {
    /// Whether two values of this type combine by addition.
    fn is_additive(self) -> bool {
        matches!(self, MetricType::Sum)
    }
}

/// A named, typed, versioned scalar derived from raw metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfRollupValue {
    pub name: String,
    pub metric_type: MetricType,
    /// Version of the computation that produced `value`
    pub version: i32,
    pub value: f64,
}

impl PerfRollupValue {
    pub fn new(name: impl Into<String>, metric_type: MetricType, version: i32, value: f64) -> Self {
        Self {
            name: name.into(),
            metric_type,
            version,
            value,
        }
    }

    /// Recombine two rollups of the same name and type.
    ///
    /// The merged version is the newer of the two.
    pub fn merge(&self, other: &PerfRollupValue) -> Result<PerfRollupValue> {
        if self.name != other.name {
            return Err(PerfError::InvalidInput(format!(
                "cannot merge rollup '{}' with '{}'",
                self.name, other.name
            )));
        }
        if self.metric_type != other.metric_type {
            return Err(PerfError::InvalidInput(format!(
                "rollup '{}' has mismatched metric types {:?} and {:?}",
                self.name, self.metric_type, other.metric_type
            )));
        }

        let value = match self.metric_type {
            t if t.is_additive() => self.value + other.value,
            MetricType::Max => self.value.max(other.value),
            MetricType::Min => self.value.min(other.value),
            _ => (self.value + other.value) / 2.0,
        };

        Ok(PerfRollupValue {
            name: self.name.clone(),
            metric_type: self.metric_type,
            version: self.version.max(other.version),
            value,
        })
    }
}

/// Helpers over the ordered rollup list of one result.
pub trait PerfRollups {
    fn rollup(&self, name: &str) -> Option<&PerfRollupValue>;

    /// Names must be unique within a result; this reports violations without
    /// rejecting them.
    fn has_duplicate_names(&self) -> bool;

    /// True when the named rollup exists but was computed by an older version.
    fn is_stale(&self, name: &str, current_version: i32) -> bool;
}

impl PerfRollups for [PerfRollupValue] {
    fn rollup(&self, name: &str) -> Option<&PerfRollupValue> {
        self.iter().find(|r| r.name == name)
    }

    fn has_duplicate_names(&self) -> bool {
        let mut seen = HashSet::new();
        self.iter().any(|r| !seen.insert(r.name.as_str()))
    }

    fn is_stale(&self, name: &str, current_version: i32) -> bool {
        self.rollup(name)
            .is_some_and(|r| r.version < current_version)
    }
}
