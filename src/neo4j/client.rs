//! Neo4j client for performance results
//!
//! Each result is one `:PerformanceResult` node keyed by its identity.
//! Lineage is not stored as relationships: the `parent` property is the only
//! link and subtrees are collected level by level with `parent IN $frontier`.

use crate::model::{AnalysisInfo, PerformanceResult, PerformanceResultInfo, SaveOutcome};
use crate::query::cypher::find_results_query;
use crate::query::PerformanceOptions;
use crate::signal_processing::{SeriesKey, SeriesUpdate};
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use neo4rs::{query, Graph, Query};
use std::sync::Arc;
use std::time::Duration;

/// Client for Neo4j operations
pub struct Neo4jClient {
    graph: Arc<Graph>,
    query_timeout: Option<Duration>,
}

fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .with_context(|| format!("Timestamp out of range: {}", ms))
}

impl Neo4jClient {
    /// Connect and make sure the schema exists
    pub async fn new(uri: &str, user: &str, password: &str) -> Result<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .context("Failed to connect to Neo4j")?;

        let client = Self::from_graph(Arc::new(graph));
        client.init_schema().await?;

        Ok(client)
    }

    /// Wrap an existing connection pool. Does not touch the schema.
    pub fn from_graph(graph: Arc<Graph>) -> Self {
        Self {
            graph,
            query_timeout: None,
        }
    }

    /// Deadline applied to every store operation, on top of the caller's
    /// cancellation token
    pub fn with_query_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout
    }

    /// Initialize constraints and indexes
    pub async fn init_schema(&self) -> Result<()> {
        let constraints = vec![
            "CREATE CONSTRAINT perf_result_id IF NOT EXISTS FOR (r:PerformanceResult) REQUIRE r.id IS UNIQUE",
        ];

        let indexes = vec![
            "CREATE INDEX perf_result_parent IF NOT EXISTS FOR (r:PerformanceResult) ON (r.parent)",
            "CREATE INDEX perf_result_task_id IF NOT EXISTS FOR (r:PerformanceResult) ON (r.task_id)",
            "CREATE INDEX perf_result_task_name IF NOT EXISTS FOR (r:PerformanceResult) ON (r.task_name)",
            "CREATE INDEX perf_result_version IF NOT EXISTS FOR (r:PerformanceResult) ON (r.version)",
            "CREATE INDEX perf_result_created IF NOT EXISTS FOR (r:PerformanceResult) ON (r.created_at_ms)",
        ];

        for constraint in constraints {
            if let Err(e) = self.graph.run(query(constraint)).await {
                tracing::warn!("Constraint may already exist: {}", e);
            }
        }

        for index in indexes {
            if let Err(e) = self.graph.run(query(index)).await {
                tracing::warn!("Index may already exist: {}", e);
            }
        }

        Ok(())
    }

    async fn collect_results(&self, q: Query, column: &str) -> Result<Vec<PerformanceResult>> {
        let mut result = self.graph.execute(q).await?;
        let mut results = Vec::new();
        while let Some(row) = result.next().await? {
            let node: neo4rs::Node = row.get(column)?;
            results.push(self.node_to_result(&node)?);
        }
        Ok(results)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Get a result by identity
    pub async fn get_result(&self, id: &str) -> Result<Option<PerformanceResult>> {
        let q = query("MATCH (r:PerformanceResult {id: $id}) RETURN r").param("id", id);
        Ok(self.collect_results(q, "r").await?.into_iter().next())
    }

    /// Filtered, ordered and paginated listing
    pub async fn find_results(&self, opts: &PerformanceOptions) -> Result<Vec<PerformanceResult>> {
        self.collect_results(find_results_query(opts), "r").await
    }

    /// Results whose parent is one of `parent_ids`
    pub async fn get_children(&self, parent_ids: &[String]) -> Result<Vec<PerformanceResult>> {
        if parent_ids.is_empty() {
            return Ok(vec![]);
        }
        let q = query("MATCH (c:PerformanceResult) WHERE c.parent IN $ids RETURN c")
            .param("ids", parent_ids.to_vec());
        self.collect_results(q, "c").await
    }

    /// The root plus every descendant within `max_depth` hops, in no
    /// particular order. Empty if the root does not exist.
    pub async fn get_subtree(
        &self,
        root_id: &str,
        max_depth: usize,
    ) -> Result<Vec<PerformanceResult>> {
        let Some(root) = self.get_result(root_id).await? else {
            return Ok(vec![]);
        };
        let mut seen = std::collections::HashSet::from([root.id.clone()]);
        let mut frontier = vec![root.id.clone()];
        let mut subtree = vec![root];

        for _ in 0..max_depth {
            if frontier.is_empty() {
                break;
            }
            let children = self.get_children(&frontier).await?;
            frontier = Vec::with_capacity(children.len());
            for child in children {
                if seen.insert(child.id.clone()) {
                    frontier.push(child.id.clone());
                    subtree.push(child);
                }
            }
        }

        Ok(subtree)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// MERGE by identity. `created_at` is only written on create;
    /// `updated_at_ms` moves forward on every write, by at least 1ms.
    pub async fn upsert_result(&self, result: &PerformanceResult) -> Result<SaveOutcome> {
        let q = query(
            r#"
            OPTIONAL MATCH (existing:PerformanceResult {id: $id})
            WITH existing IS NULL AS created
            MERGE (r:PerformanceResult {id: $id})
            ON CREATE SET r.created_at = $created_at,
                          r.created_at_ms = $created_at_ms
            SET r.project = $project,
                r.version = $version,
                r.variant = $variant,
                r.task_name = $task_name,
                r.task_id = $task_id,
                r.test_name = $test_name,
                r.order = $order,
                r.tags = $tags,
                r.mainline = $mainline,
                r.parent = $parent,
                r.rollups = $rollups,
                r.rollup_count = $rollup_count,
                r.artifacts = $artifacts,
                r.processed_at_ms = CASE WHEN $processed_at_ms < 0 THEN null ELSE $processed_at_ms END,
                r.updated_at_ms = CASE
                    WHEN r.updated_at_ms IS NOT NULL AND r.updated_at_ms >= $now_ms
                    THEN r.updated_at_ms + 1
                    ELSE $now_ms
                END
            RETURN created, r.created_at_ms AS created_at_ms, r.updated_at_ms AS updated_at_ms
            "#,
        )
        .param("id", result.id.clone())
        .param(
            "created_at",
            result
                .created_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        )
        .param("created_at_ms", result.created_at.timestamp_millis())
        .param("project", result.info.project.clone())
        .param("version", result.info.version.clone())
        .param("variant", result.info.variant.clone())
        .param("task_name", result.info.task_name.clone())
        .param("task_id", result.info.task_id.clone())
        .param("test_name", result.info.test_name.clone())
        .param("order", result.info.order)
        .param("tags", result.info.tags.clone())
        .param("mainline", result.info.mainline)
        .param("parent", result.info.parent.clone())
        .param("rollups", serde_json::to_string(&result.rollups)?)
        .param("rollup_count", result.rollups.len() as i64)
        .param("artifacts", serde_json::to_string(&result.artifacts)?)
        .param(
            "processed_at_ms",
            result
                .analysis
                .processed_at
                .map(|t| t.timestamp_millis())
                .unwrap_or(-1),
        )
        .param("now_ms", Utc::now().timestamp_millis());

        let mut rows = self.graph.execute(q).await?;
        let row = rows
            .next()
            .await?
            .context("Upsert returned no row")?;
        Ok(SaveOutcome {
            created: row.get("created")?,
            created_at: millis_to_datetime(row.get("created_at_ms")?)?,
            updated_at: millis_to_datetime(row.get("updated_at_ms")?)?,
        })
    }

    /// Delete by identity, returning how many nodes were removed
    pub async fn delete_results(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let q = query(
            "MATCH (r:PerformanceResult) WHERE r.id IN $ids DETACH DELETE r RETURN count(r) AS deleted",
        )
        .param("ids", ids.to_vec());
        let mut rows = self.graph.execute(q).await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>("deleted")? as usize),
            None => Ok(0),
        }
    }

    // ========================================================================
    // Signal-processing bookkeeping
    // ========================================================================

    /// Mainline series that hold results with rollups and no processed_at,
    /// with the newest revision among those results
    pub async fn get_unanalyzed_series(&self) -> Result<Vec<SeriesUpdate>> {
        let q = query(
            r#"
            MATCH (r:PerformanceResult)
            WHERE r.mainline = true AND r.rollup_count > 0 AND r.processed_at_ms IS NULL
            RETURN r.project AS project, r.variant AS variant,
                   r.task_name AS task_name, r.test_name AS test_name,
                   max(coalesce(r.updated_at_ms, r.created_at_ms)) AS revision_ms
            ORDER BY project, variant, task_name, test_name
            "#,
        );
        let mut rows = self.graph.execute(q).await?;
        let mut updates = Vec::new();
        while let Some(row) = rows.next().await? {
            updates.push(SeriesUpdate {
                key: SeriesKey {
                    project: row.get("project")?,
                    variant: row.get("variant")?,
                    task_name: row.get("task_name")?,
                    test_name: row.get("test_name")?,
                },
                revision: millis_to_datetime(row.get("revision_ms")?)?,
            });
        }
        Ok(updates)
    }

    pub async fn set_series_processed(
        &self,
        series: &SeriesKey,
        up_to: DateTime<Utc>,
        processed_at: DateTime<Utc>,
    ) -> Result<usize> {
        let q = query(
            r#"
            MATCH (r:PerformanceResult)
            WHERE r.project = $project AND r.variant = $variant
              AND r.task_name = $task_name AND r.test_name = $test_name
              AND r.mainline = true
              AND coalesce(r.updated_at_ms, r.created_at_ms) <= $up_to_ms
            SET r.processed_at_ms = $processed_at_ms
            RETURN count(r) AS updated
            "#,
        )
        .param("project", series.project.clone())
        .param("variant", series.variant.clone())
        .param("task_name", series.task_name.clone())
        .param("test_name", series.test_name.clone())
        .param("up_to_ms", up_to.timestamp_millis())
        .param("processed_at_ms", processed_at.timestamp_millis());

        let mut rows = self.graph.execute(q).await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>("updated")? as usize),
            None => Ok(0),
        }
    }

    /// Helper to convert Neo4j node to PerformanceResult
    fn node_to_result(&self, node: &neo4rs::Node) -> Result<PerformanceResult> {
        let rollups: String = node.get("rollups").unwrap_or_else(|_| "[]".to_string());
        let artifacts: String = node.get("artifacts").unwrap_or_else(|_| "[]".to_string());
        let id: String = node.get("id")?;
        let created_at_ms: i64 = node.get("created_at_ms")?;
        // Nodes written before revisions were tracked
        let updated_at_ms: i64 = node.get("updated_at_ms").unwrap_or(created_at_ms);

        Ok(PerformanceResult {
            info: PerformanceResultInfo {
                project: node.get("project")?,
                version: node.get("version")?,
                variant: node.get("variant")?,
                task_name: node.get("task_name")?,
                task_id: node.get("task_id")?,
                test_name: node.get("test_name")?,
                order: node.get("order").unwrap_or(0),
                tags: node.get("tags").unwrap_or_default(),
                mainline: node.get("mainline").unwrap_or(false),
                parent: node.get("parent").unwrap_or_default(),
            },
            rollups: serde_json::from_str(&rollups)
                .with_context(|| format!("Malformed rollups on {}", id))?,
            artifacts: serde_json::from_str(&artifacts)
                .with_context(|| format!("Malformed artifacts on {}", id))?,
            created_at: millis_to_datetime(created_at_ms)?,
            updated_at: millis_to_datetime(updated_at_ms)?,
            analysis: AnalysisInfo {
                processed_at: node
                    .get::<i64>("processed_at_ms")
                    .ok()
                    .map(millis_to_datetime)
                    .transpose()?,
            },
            id,
        })
    }
}
