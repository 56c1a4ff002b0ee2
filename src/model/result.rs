//! Performance result entity

use super::artifact::ArtifactInfo;
use super::identity::identity;
use super::rollup::PerfRollupValue;
use crate::error::{PerfError, Result};
use crate::store::ResultStore;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Descriptive attributes of one performance observation
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PerformanceResultInfo {
    pub project: String,
    pub version: String,
    pub variant: String,
    pub task_name: String,
    pub task_id: String,
    pub test_name: String,
    /// Build/commit sequence number within the project
    pub order: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    /// True for results from the primary integration branch
    pub mainline: bool,
    /// Identity of the parent result, empty for a root
    #[serde(default)]
    pub parent: String,
}

impl PerformanceResultInfo {
    pub fn id(&self) -> String {
        identity(self)
    }

    /// True if any of `tags` is among this result's tags
    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        self.tags.iter().any(|t| tags.contains(t))
    }

    /// Identifying fields and parent differ between two infos. Tags, order,
    /// mainline and task name are allowed to change between submissions.
    fn diverges_from(&self, other: &PerformanceResultInfo) -> Option<&'static str> {
        if self.project != other.project {
            Some("project")
        } else if self.version != other.version {
            Some("version")
        } else if self.variant != other.variant {
            Some("variant")
        } else if self.task_id != other.task_id {
            Some("task_id")
        } else if self.test_name != other.test_name {
            Some("test_name")
        } else if self.parent != other.parent {
            Some("parent")
        } else {
            None
        }
    }
}

/// Signal-processing bookkeeping for a result
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnalysisInfo {
    /// When signal processing last consumed this result
    pub processed_at: Option<DateTime<Utc>>,
}

/// One test/task performance observation plus its rollups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceResult {
    pub id: String,
    pub info: PerformanceResultInfo,
    #[serde(default)]
    pub artifacts: Vec<ArtifactInfo>,
    #[serde(default)]
    pub rollups: Vec<PerfRollupValue>,
    pub created_at: DateTime<Utc>,
    /// Write revision, restamped by the store on every save. Strictly
    /// increases across saves of one identity.
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub analysis: AnalysisInfo,
}

/// What `save_new` does when the identity already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SavePolicy {
    /// Overwrite non-identifying fields; re-submission is an upsert
    #[default]
    Overwrite,
    /// Fail with `Conflict` if the stored record's identifying fields or
    /// parent differ from the new one
    RejectDivergent,
}

/// Result of an upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    /// False when an existing record was overwritten
    pub created: bool,
    /// `created_at` as stored (the first insert's timestamp)
    pub created_at: DateTime<Utc>,
    /// Revision stamped by this save
    pub updated_at: DateTime<Utc>,
}

/// Revision for a save at `now`: millisecond precision, and at least one
/// millisecond past the stored revision.
pub(crate) fn next_revision(
    previous: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let now = now.trunc_subsecs(3);
    match previous {
        Some(previous) if previous >= now => previous + Duration::milliseconds(1),
        _ => now,
    }
}

impl PerformanceResult {
    /// Build a result, computing its identity and stamping `created_at`.
    ///
    /// Rollup name uniqueness is the caller's responsibility.
    pub fn create(
        info: PerformanceResultInfo,
        artifacts: Vec<ArtifactInfo>,
        rollups: Vec<PerfRollupValue>,
    ) -> Self {
        let now = Utc::now().trunc_subsecs(3);
        Self {
            id: info.id(),
            info,
            artifacts,
            rollups,
            created_at: now,
            updated_at: now,
            analysis: AnalysisInfo::default(),
        }
    }

    /// Override the creation timestamp (ingestion replays, tests).
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at.trunc_subsecs(3);
        self.updated_at = self.created_at;
        self
    }

    /// Persist the result through `store`.
    ///
    /// On overwrite the stored `created_at` is kept. Both it and the new
    /// revision are copied back into `self`.
    pub async fn save_new(
        &mut self,
        ctx: &CancellationToken,
        store: &dyn ResultStore,
        policy: SavePolicy,
    ) -> Result<SaveOutcome> {
        if policy == SavePolicy::RejectDivergent {
            if let Some(existing) = store.get(ctx, &self.id).await? {
                if let Some(field) = existing.info.diverges_from(&self.info) {
                    return Err(PerfError::Conflict {
                        id: self.id.clone(),
                        reason: format!("stored {} differs from submitted value", field),
                    });
                }
            }
        }

        let outcome = store.upsert(ctx, self).await?;
        self.created_at = outcome.created_at;
        self.updated_at = outcome.updated_at;
        tracing::debug!(
            id = %self.id,
            project = %self.info.project,
            task_id = %self.info.task_id,
            created = outcome.created,
            "Saved performance result"
        );
        Ok(outcome)
    }

    /// Whether signal processing has not yet consumed this result
    pub fn needs_analysis(&self) -> bool {
        !self.rollups.is_empty() && self.analysis.processed_at.is_none()
    }
}
