//! Descriptors for the raw metric payloads a result was computed from.
//!
//! The bytes live in the external object store; only the location and
//! encoding are recorded here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactFormat {
    Ftdc,
    Bson,
    Json,
    Csv,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactCompression {
    #[default]
    None,
    Gzip,
    Zip,
}

/// Location of one raw per-run metrics payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    /// Kind of payload (e.g. "raw-metrics", "ftdc-timeseries")
    pub kind: String,
    pub bucket: String,
    pub path: String,
    pub format: ArtifactFormat,
    #[serde(default)]
    pub compression: ArtifactCompression,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ArtifactInfo {
    /// Object-store key for the payload
    pub fn key(&self) -> String {
        format!("{}/{}", self.bucket, self.path)
    }
}
