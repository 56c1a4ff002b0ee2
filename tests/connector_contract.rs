//! Connector contract tests
//!
//! The same checks run against the in-memory connector and, when a Neo4j
//! instance is reachable at NEO4J_URI, against the persistent one.
//! The Neo4j run deletes and re-creates the fixture ids, so point it at a
//! dedicated database.
//!
//! Run with: cargo test --test connector_contract

use chrono::{Duration, Utc};
use perf_store::model::{
    ArtifactCompression, ArtifactFormat, ArtifactInfo, MetricType, PerfRollupValue,
    PerformanceResult, PerformanceResultInfo, SavePolicy, TimeRange,
};
use perf_store::neo4j::Neo4jClient;
use perf_store::query::PerformanceOptions;
use perf_store::queue::{JobQueue, LocalQueue};
use perf_store::signal_processing::{LoggingSignalProcessor, RecalculationScheduler};
use perf_store::store::MemoryStore;
use perf_store::{Connector, DbConnector, MockConnector};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Fixtures
// ============================================================================

struct Fixture {
    /// Index-addressable so tests can name "result 0", "result 6"
    results: Vec<PerformanceResult>,
    rollups: Vec<PerformanceResult>,
}

fn info(project: &str, version: &str, task_name: &str, task_id: &str) -> PerformanceResultInfo {
    PerformanceResultInfo {
        project: project.to_string(),
        version: version.to_string(),
        task_name: task_name.to_string(),
        task_id: task_id.to_string(),
        mainline: true,
        ..Default::default()
    }
}

fn tags(tags: &[&str]) -> Vec<String> {
    tags.iter().map(|t| t.to_string()).collect()
}

fn fixture() -> Fixture {
    // (info, parent index)
    let specs: Vec<(PerformanceResultInfo, Option<usize>)> = vec![
        (
            PerformanceResultInfo {
                order: 1,
                test_name: "t0".into(),
                tags: tags(&["tag1", "tag2"]),
                ..info("test", "0", "task0", "task1")
            },
            None,
        ),
        (
            PerformanceResultInfo {
                test_name: "t1".into(),
                tags: tags(&["tag2"]),
                ..info("test", "0", "task1", "task1")
            },
            Some(0),
        ),
        (
            PerformanceResultInfo {
                test_name: "t2".into(),
                tags: tags(&["tag1"]),
                ..info("test", "1", "task2", "task1")
            },
            Some(0),
        ),
        (
            PerformanceResultInfo {
                test_name: "t3".into(),
                tags: tags(&["tag3"]),
                ..info("test", "0", "task3", "task1")
            },
            Some(1),
        ),
        (
            PerformanceResultInfo {
                order: 2,
                mainline: false,
                ..info("test", "0", "task0", "task0patch")
            },
            None,
        ),
        (
            PerformanceResultInfo {
                order: 3,
                variant: "v".into(),
                tags: tags(&["tag3"]),
                ..info("test", "1", "task0", "task2")
            },
            None,
        ),
        (
            PerformanceResultInfo {
                mainline: false,
                ..info("removeThisOne", "", "", "")
            },
            None,
        ),
        (
            PerformanceResultInfo {
                mainline: false,
                ..info("removeThisOne", "", "", "child")
            },
            Some(6),
        ),
    ];

    let created_at = Utc::now() - Duration::seconds(1);
    let mut results: Vec<PerformanceResult> = Vec::with_capacity(specs.len());
    for (mut info, parent) in specs {
        if let Some(parent) = parent {
            info.parent = results[parent].id.clone();
        }
        results.push(PerformanceResult::create(info, vec![], vec![]).with_created_at(created_at));
    }
    results[0].artifacts = vec![ArtifactInfo {
        kind: "raw-metrics".into(),
        bucket: "perf-bucket".into(),
        path: "test/0/task1/t0.ftdc".into(),
        format: ArtifactFormat::Ftdc,
        compression: ArtifactCompression::Gzip,
        tags: tags(&["tag1"]),
        created_at,
    }];

    let rollup = |series: u8, version: &str, order: i64, names: &[&str]| {
        let info = PerformanceResultInfo {
            project: format!("rollup{}project", series),
            variant: format!("rollup{}variant", series),
            test_name: format!("rollup{}test", series),
            order,
            ..info(
                "",
                version,
                &format!("rollup{}task", series),
                &format!("rollup{}task", series),
            )
        };
        let values = names
            .iter()
            .map(|n| PerfRollupValue::new(*n, MetricType::Sum, 0, 10000.0))
            .collect();
        PerformanceResult::create(info, vec![], values).with_created_at(created_at)
    };
    let rollups = vec![
        rollup(1, "0r", 1, &["OverheadTotal", "OperationsTotal"]),
        rollup(2, "0r", 1, &["OperationsTotal"]),
        rollup(1, "1r", 2, &["OverheadTotal", "OperationsTotal"]),
    ];

    Fixture { results, rollups }
}

impl Fixture {
    fn all(&self) -> impl Iterator<Item = &PerformanceResult> {
        self.results.iter().chain(self.rollups.iter())
    }

    fn ids(&self) -> Vec<String> {
        self.all().map(|r| r.id.clone()).collect()
    }

    async fn seed(&self, connector: &dyn Connector) {
        let ctx = CancellationToken::new();
        for result in self.all() {
            let mut result = result.clone();
            result
                .save_new(&ctx, connector.store(), SavePolicy::default())
                .await
                .unwrap();
        }
    }
}

// ============================================================================
// Backends
// ============================================================================

struct Backend {
    connector: Arc<dyn Connector>,
    queue: Arc<LocalQueue>,
}

fn mock_backend() -> Backend {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(LocalQueue::new(2, 100));
    let scheduler =
        RecalculationScheduler::new(store.clone(), queue.clone(), Arc::new(LoggingSignalProcessor));
    Backend {
        connector: Arc::new(MockConnector::new(store, scheduler)),
        queue,
    }
}

/// Connect to Neo4j, or None if it is not reachable
async fn db_backend() -> Option<Backend> {
    let uri = std::env::var("NEO4J_URI").unwrap_or_else(|_| "bolt://localhost:7687".into());
    let user = std::env::var("NEO4J_USER").unwrap_or_else(|_| "neo4j".into());
    let password = std::env::var("NEO4J_PASSWORD").unwrap_or_else(|_| "perfstore".into());

    let connect = Neo4jClient::new(&uri, &user, &password);
    let client = match tokio::time::timeout(std::time::Duration::from_secs(3), connect).await {
        Ok(Ok(client)) => Arc::new(client),
        _ => return None,
    };

    // Clear leftovers from earlier runs; identities are deterministic
    client.delete_results(&fixture().ids()).await.ok()?;

    let queue = Arc::new(LocalQueue::new(2, 100));
    let scheduler =
        RecalculationScheduler::new(client.clone(), queue.clone(), Arc::new(LoggingSignalProcessor));
    Some(Backend {
        connector: Arc::new(DbConnector::new(client, scheduler)),
        queue,
    })
}

fn result_ids(results: &[PerformanceResult]) -> Vec<String> {
    results.iter().map(|r| r.id.clone()).collect()
}

// ============================================================================
// Contract
// ============================================================================

async fn check_find_by_id(conn: &dyn Connector, fx: &Fixture) {
    let ctx = CancellationToken::new();
    let expected = &fx.results[0];

    for _ in 0..2 {
        let found = conn
            .find_performance_result_by_id(&ctx, &expected.id)
            .await
            .unwrap();
        assert_eq!(found.id, expected.id);
        assert_eq!(found.info, expected.info);
        assert_eq!(found.artifacts, expected.artifacts);
        assert_eq!(found.created_at, expected.created_at);
    }

    let err = conn
        .find_performance_result_by_id(&ctx, "doesNotExist")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

async fn check_find_by_task_id(conn: &dyn Connector, fx: &Fixture) {
    let ctx = CancellationToken::new();
    let task_id = fx.results[0].info.task_id.clone();
    let expected = fx.results.iter().filter(|r| r.info.task_id == task_id).count();

    let found = conn
        .find_performance_results(&ctx, &PerformanceOptions::by_task_id(&task_id))
        .await
        .unwrap();
    assert_eq!(found.len(), expected);
    assert!(found.iter().all(|r| r.info.task_id == task_id));

    // Tags are OR-ed and narrow the set
    let tagged = conn
        .find_performance_results(
            &ctx,
            &PerformanceOptions {
                tags: tags(&["tag1", "tag2"]),
                ..PerformanceOptions::by_task_id(&task_id)
            },
        )
        .await
        .unwrap();
    assert!(!tagged.is_empty() && tagged.len() < expected);
    for result in &tagged {
        assert!(result.info.has_any_tag(&tags(&["tag1", "tag2"])));
    }

    // Interval narrows the set
    let ranged = conn
        .find_performance_results(
            &ctx,
            &PerformanceOptions {
                interval: Some(TimeRange::lookback(None, Duration::hours(1)).unwrap()),
                ..PerformanceOptions::by_task_id(&task_id)
            },
        )
        .await
        .unwrap();
    assert_eq!(ranged.len(), expected);

    let err = conn
        .find_performance_results(
            &ctx,
            &PerformanceOptions {
                interval: Some(
                    TimeRange::lookback(Some(Utc::now() - Duration::hours(1)), Duration::hours(1))
                        .unwrap(),
                ),
                ..PerformanceOptions::by_task_id(&task_id)
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = conn
        .find_performance_results(&ctx, &PerformanceOptions::by_task_id("nonexistent"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

async fn check_find_by_version(conn: &dyn Connector, fx: &Fixture) {
    let ctx = CancellationToken::new();
    let expected = fx.results.iter().filter(|r| r.info.version == "0").count();
    assert_eq!(expected, 4);

    let found = conn
        .find_performance_results(&ctx, &PerformanceOptions::by_version("0"))
        .await
        .unwrap();
    assert_eq!(found.len(), expected);
    assert!(found.iter().all(|r| r.info.version == "0"));
    // Without task_name the full sequence is id ascending
    let mut sorted = result_ids(&found);
    sorted.sort();
    assert_eq!(result_ids(&found), sorted);

    let tagged = conn
        .find_performance_results(
            &ctx,
            &PerformanceOptions {
                tags: tags(&["tag1"]),
                ..PerformanceOptions::by_version("0")
            },
        )
        .await
        .unwrap();
    assert!(!tagged.is_empty() && tagged.len() < expected);
    for result in &tagged {
        assert_eq!(result.info.version, "0");
        assert!(result.info.has_any_tag(&tags(&["tag1"])));
    }

    // Limit reproduces the head of the unpaginated sequence
    let limited = conn
        .find_performance_results(
            &ctx,
            &PerformanceOptions {
                limit: Some(2),
                ..PerformanceOptions::by_version("0")
            },
        )
        .await
        .unwrap();
    assert_eq!(result_ids(&limited), result_ids(&found[..2]));

    // Skip reproduces the tail of the unpaginated sequence
    let skipped = conn
        .find_performance_results(
            &ctx,
            &PerformanceOptions {
                skip: 3,
                ..PerformanceOptions::by_version("0")
            },
        )
        .await
        .unwrap();
    assert_eq!(result_ids(&skipped), result_ids(&found[3..]));

    // Skipping past the end is an empty page on a positive filter
    let err = conn
        .find_performance_results(
            &ctx,
            &PerformanceOptions {
                skip: 10,
                ..PerformanceOptions::by_version("0")
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

async fn check_find_by_task_name(conn: &dyn Connector, fx: &Fixture) {
    let ctx = CancellationToken::new();
    let expected: Vec<&PerformanceResult> = fx
        .results
        .iter()
        .filter(|r| r.info.task_name == "task0" && r.info.mainline)
        .collect();
    assert_eq!(expected.len(), 2);
    let window = TimeRange::lookback(None, Duration::hours(100)).unwrap();

    // Full sequence, newest build first
    let all = conn
        .find_performance_results(
            &ctx,
            &PerformanceOptions {
                interval: Some(window),
                ..PerformanceOptions::by_task_name("task0")
            },
        )
        .await
        .unwrap();
    assert_eq!(all.len(), expected.len());
    assert!(all.iter().all(|r| r.info.mainline && r.info.task_name == "task0"));
    assert!(all.windows(2).all(|w| w[0].info.order >= w[1].info.order));
    assert_eq!(result_ids(&all), vec![fx.results[5].id.clone(), fx.results[0].id.clone()]);

    let tagged = conn
        .find_performance_results(
            &ctx,
            &PerformanceOptions {
                tags: tags(&["tag1", "tag2"]),
                interval: Some(window),
                ..PerformanceOptions::by_task_name("task0")
            },
        )
        .await
        .unwrap();
    assert!(!tagged.is_empty() && tagged.len() < expected.len());
    for result in &tagged {
        assert_eq!(result.info.task_name, "task0");
        assert!(result.info.has_any_tag(&tags(&["tag1", "tag2"])));
    }

    let found = conn
        .find_performance_results(
            &ctx,
            &PerformanceOptions {
                limit: Some(2),
                ..PerformanceOptions::by_task_name("task0")
            },
        )
        .await
        .unwrap();
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|r| r.info.mainline && r.info.task_name == "task0"));
    // Newest build first
    assert!(found[0].info.order > found[1].info.order);

    let variant = conn
        .find_performance_results(
            &ctx,
            &PerformanceOptions {
                variant: Some("v".into()),
                ..PerformanceOptions::by_task_name("task0")
            },
        )
        .await
        .unwrap();
    assert_eq!(variant.len(), 1);
    assert_eq!(variant[0].info.variant, "v");
}

async fn check_no_positive_filter_may_be_empty(conn: &dyn Connector) {
    let ctx = CancellationToken::new();
    let found = conn
        .find_performance_results(
            &ctx,
            &PerformanceOptions {
                variant: Some("no-such-variant".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(found.is_empty());
}

async fn check_with_children(conn: &dyn Connector, fx: &Fixture) {
    let ctx = CancellationToken::new();
    let root = &fx.results[0].id;
    let r = |i: usize| fx.results[i].id.clone();

    let depth0 = conn
        .find_performance_result_with_children(&ctx, root, 0, &[])
        .await
        .unwrap();
    assert_eq!(result_ids(&depth0), vec![r(0)]);

    let depth1 = conn
        .find_performance_result_with_children(&ctx, root, 1, &[])
        .await
        .unwrap();
    assert_eq!(depth1[0].id, r(0));
    let level1: HashSet<String> = result_ids(&depth1[1..]).into_iter().collect();
    assert_eq!(level1, HashSet::from([r(1), r(2)]));

    let depth2 = conn
        .find_performance_result_with_children(&ctx, root, 2, &[])
        .await
        .unwrap();
    assert_eq!(depth2.len(), 4);
    assert_eq!(depth2[3].id, r(3));
    let depth1_set: HashSet<String> = result_ids(&depth1).into_iter().collect();
    let depth2_set: HashSet<String> = result_ids(&depth2).into_iter().collect();
    assert!(depth2_set.is_superset(&depth1_set));

    // Result 3 hangs under result 1, which lacks tag3; it is still reached
    let tagged = conn
        .find_performance_result_with_children(&ctx, root, 2, &tags(&["tag3"]))
        .await
        .unwrap();
    assert_eq!(result_ids(&tagged), vec![r(0), r(3)]);

    let err = conn
        .find_performance_result_with_children(&ctx, "doesNotExist", 3, &[])
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

async fn check_remove(conn: &dyn Connector, fx: &Fixture) {
    let ctx = CancellationToken::new();
    let ids = [fx.results[6].id.clone(), fx.results[7].id.clone()];
    for id in &ids {
        conn.find_performance_result_by_id(&ctx, id).await.unwrap();
    }

    let removed = conn
        .remove_performance_result_by_id(&ctx, &ids[0])
        .await
        .unwrap();
    assert_eq!(removed, 2);

    for id in &ids {
        let err = conn.find_performance_result_by_id(&ctx, id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    // Removing again is not an error
    let removed = conn
        .remove_performance_result_by_id(&ctx, &ids[0])
        .await
        .unwrap();
    assert_eq!(removed, 0);
}

/// A second save under the same identity overwrites in place
async fn check_overwrite(conn: &dyn Connector, fx: &Fixture) {
    let ctx = CancellationToken::new();
    let original = &fx.results[0];
    let task_query = PerformanceOptions::by_task_id(&original.info.task_id);
    let count_before = conn
        .find_performance_results(&ctx, &task_query)
        .await
        .unwrap()
        .len();
    let before = conn
        .find_performance_result_by_id(&ctx, &original.id)
        .await
        .unwrap();

    let mut resubmitted = PerformanceResult::create(
        PerformanceResultInfo {
            tags: tags(&["retagged"]),
            ..original.info.clone()
        },
        original.artifacts.clone(),
        vec![],
    )
    .with_created_at(Utc::now() + Duration::hours(1));
    assert_eq!(resubmitted.id, original.id);
    let outcome = resubmitted
        .save_new(&ctx, conn.store(), SavePolicy::default())
        .await
        .unwrap();
    assert!(!outcome.created);
    assert_eq!(outcome.created_at, original.created_at);

    let found = conn
        .find_performance_result_by_id(&ctx, &original.id)
        .await
        .unwrap();
    assert_eq!(found.info.tags, tags(&["retagged"]));
    assert_eq!(found.created_at, original.created_at);
    assert!(found.updated_at > before.updated_at);
    assert_eq!(found.updated_at, outcome.updated_at);

    let count_after = conn
        .find_performance_results(&ctx, &task_query)
        .await
        .unwrap()
        .len();
    assert_eq!(count_after, count_before);
}

async fn check_schedule(conn: &dyn Connector, queue: &LocalQueue) {
    let ctx = CancellationToken::new();
    assert!(!queue.is_started());

    conn.schedule_signal_processing_recalculate_jobs(&ctx)
        .await
        .unwrap();
    assert_eq!(queue.stats().total, 2);

    // Before the queue drains, a second pass submits the same job ids
    conn.schedule_signal_processing_recalculate_jobs(&ctx)
        .await
        .unwrap();
    assert_eq!(queue.stats().total, 2);
}

async fn check_canceled(conn: &dyn Connector, fx: &Fixture) {
    let ctx = CancellationToken::new();
    ctx.cancel();
    let id = &fx.results[0].id;

    assert!(conn
        .find_performance_result_by_id(&ctx, id)
        .await
        .unwrap_err()
        .is_canceled());
    assert!(conn
        .find_performance_results(&ctx, &PerformanceOptions::by_version("0"))
        .await
        .unwrap_err()
        .is_canceled());
    assert!(conn
        .find_performance_result_with_children(&ctx, id, 2, &[])
        .await
        .unwrap_err()
        .is_canceled());
    assert!(conn
        .remove_performance_result_by_id(&ctx, id)
        .await
        .unwrap_err()
        .is_canceled());

    // Nothing was removed
    conn.find_performance_result_by_id(&CancellationToken::new(), id)
        .await
        .unwrap();
}

/// Both backends return the same ids in the same order for the same query
async fn check_backends_agree(db: &dyn Connector, mock: &dyn Connector, fx: &Fixture) {
    let ctx = CancellationToken::new();
    let queries = vec![
        PerformanceOptions::by_version("0"),
        PerformanceOptions::by_task_id("task1"),
        PerformanceOptions::by_task_name("task0"),
        PerformanceOptions {
            tags: tags(&["tag3"]),
            ..PerformanceOptions::by_task_id("task1")
        },
        PerformanceOptions {
            skip: 1,
            limit: Some(2),
            ..PerformanceOptions::by_version("0")
        },
        PerformanceOptions {
            tags: tags(&["tag1"]),
            ..PerformanceOptions::by_version("0")
        },
        PerformanceOptions {
            limit: Some(2),
            ..PerformanceOptions::by_version("0")
        },
        PerformanceOptions {
            tags: tags(&["tag1", "tag2"]),
            ..PerformanceOptions::by_task_name("task0")
        },
        PerformanceOptions {
            interval: Some(TimeRange::lookback(None, Duration::hours(100)).unwrap()),
            ..PerformanceOptions::by_task_name("task0")
        },
        PerformanceOptions {
            variant: Some("v".into()),
            ..PerformanceOptions::by_task_name("task0")
        },
    ];
    for opts in queries {
        let from_db = db.find_performance_results(&ctx, &opts).await.unwrap();
        let from_mock = mock.find_performance_results(&ctx, &opts).await.unwrap();
        assert_eq!(result_ids(&from_db), result_ids(&from_mock), "{}", opts.describe());
    }

    let root = &fx.results[0].id;
    let from_db = db
        .find_performance_result_with_children(&ctx, root, 5, &[])
        .await
        .unwrap();
    let from_mock = mock
        .find_performance_result_with_children(&ctx, root, 5, &[])
        .await
        .unwrap();
    assert_eq!(result_ids(&from_db), result_ids(&from_mock));

    let stored = db.store().get(&ctx, root).await.unwrap();
    assert_eq!(stored.map(|r| r.info), Some(fx.results[0].info.clone()));
}

/// Expects `fx` to be seeded; overwrite, removal and scheduling run last
async fn run_contract(backend: &Backend, fx: &Fixture) {
    let conn = backend.connector.as_ref();

    check_find_by_id(conn, fx).await;
    check_find_by_task_id(conn, fx).await;
    check_find_by_version(conn, fx).await;
    check_find_by_task_name(conn, fx).await;
    check_no_positive_filter_may_be_empty(conn).await;
    check_with_children(conn, fx).await;
    check_canceled(conn, fx).await;
    check_overwrite(conn, fx).await;
    check_remove(conn, fx).await;
    check_schedule(conn, &backend.queue).await;
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_mock_connector_contract() {
    let backend = mock_backend();
    let fx = fixture();
    fx.seed(backend.connector.as_ref()).await;
    run_contract(&backend, &fx).await;
}

/// Single test so the shared database is not seeded and cleared concurrently
#[tokio::test]
async fn test_db_connector_contract() {
    let Some(db) = db_backend().await else {
        eprintln!("Skipping test: Neo4j not available");
        return;
    };
    let mock = mock_backend();
    let fx = fixture();
    fx.seed(db.connector.as_ref()).await;
    fx.seed(mock.connector.as_ref()).await;

    check_backends_agree(db.connector.as_ref(), mock.connector.as_ref(), &fx).await;
    run_contract(&db, &fx).await;
}

/// Concurrent saves of one identity leave exactly one record
#[tokio::test]
async fn test_concurrent_saves_converge() {
    let store = Arc::new(MemoryStore::new());
    let mut handles = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let mut result = PerformanceResult::create(
                PerformanceResultInfo {
                    tags: vec![format!("writer{}", i)],
                    ..info("p", "v", "task", "t")
                },
                vec![],
                vec![],
            );
            result
                .save_new(&CancellationToken::new(), store.as_ref(), SavePolicy::default())
                .await
                .unwrap()
        }));
    }
    let mut created = 0;
    for handle in handles {
        if handle.await.unwrap().created {
            created += 1;
        }
    }
    assert_eq!(created, 1);
    assert_eq!(store.len().await, 1);
}
