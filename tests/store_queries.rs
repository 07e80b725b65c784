//! Store and query-service integration tests against a real SQLite file.

use chrono::{TimeZone, Utc};
use tempfile::tempdir;

use callwatchd::query::{QueryError, QueryService};
use callwatchd::report::model::{AgentReport, CallStats, DurationField};
use callwatchd::storage::Storage;

async fn test_storage() -> (tempfile::TempDir, Storage) {
    let dir = tempdir().unwrap();
    let storage = Storage::new(dir.path()).await.unwrap();
    (dir, storage)
}

fn stats(total: u32, successful: u32, unsuccessful: u32) -> CallStats {
    CallStats {
        total,
        successful,
        unsuccessful,
        total_time: DurationField::from_text("01:00:00").unwrap(),
        ..Default::default()
    }
}

/// A consistent report with the given call totals, stamped at a fixed,
/// per-test-controllable instant so "latest task" ordering is deterministic.
fn report(
    agent: &str,
    number: &str,
    year: i32,
    month: u32,
    task: &str,
    incoming_total: u32,
    outgoing_total: u32,
    stamp_secs: u32,
) -> AgentReport {
    AgentReport {
        agent_name: agent.to_string(),
        agent_number: number.to_string(),
        year,
        month,
        task_id: task.to_string(),
        incoming_calls: stats(incoming_total, incoming_total, 0),
        outgoing_calls: stats(outgoing_total, outgoing_total, 0),
        consistency_flag: true,
        warnings: Vec::new(),
        last_updated: Utc
            .with_ymd_and_hms(2024, 8, 15, 12, 0, stamp_secs)
            .unwrap(),
    }
}

#[tokio::test]
async fn upsert_is_idempotent_and_latest_payload_wins() {
    let (_dir, storage) = test_storage().await;

    storage
        .upsert(&report("Anna", "101", 2024, 8, "task-a", 5, 0, 0))
        .await
        .unwrap();
    storage
        .upsert(&report("Anna", "101", 2024, 8, "task-a", 9, 2, 1))
        .await
        .unwrap();

    let docs = storage.query_month(2024, 8).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].incoming_calls.total, 9);
    assert_eq!(docs[0].outgoing_calls.total, 2);
}

#[tokio::test]
async fn reports_group_strictly_by_month() {
    let (_dir, storage) = test_storage().await;

    storage
        .upsert(&report("Anna", "101", 2024, 8, "task-aug", 3, 0, 0))
        .await
        .unwrap();
    storage
        .upsert(&report("Anna", "101", 2024, 9, "task-sep", 7, 0, 1))
        .await
        .unwrap();

    let august = storage.query_month(2024, 8).await.unwrap();
    assert_eq!(august.len(), 1);
    assert_eq!(august[0].task_id, "task-aug");

    let september = storage.query_month(2024, 9).await.unwrap();
    assert_eq!(september.len(), 1);
    assert_eq!(september[0].task_id, "task-sep");

    let months = storage.list_months().await.unwrap();
    assert_eq!(months.len(), 2);
    // Newest first.
    assert_eq!((months[0].year, months[0].month), (2024, 9));
    assert_eq!((months[1].year, months[1].month), (2024, 8));
    assert_eq!(months[0].month_name, "September");
    assert_eq!(months[1].month_year, "2024-08");
    assert_eq!(months[0].report_count, 1);
}

#[tokio::test]
async fn month_report_count_is_distinct_tasks() {
    let (_dir, storage) = test_storage().await;

    storage
        .upsert(&report("Anna", "101", 2024, 8, "task-a", 1, 0, 0))
        .await
        .unwrap();
    storage
        .upsert(&report("Boris", "102", 2024, 8, "task-a", 1, 0, 0))
        .await
        .unwrap();
    storage
        .upsert(&report("Anna", "101", 2024, 8, "task-b", 2, 0, 1))
        .await
        .unwrap();

    let months = storage.list_months().await.unwrap();
    assert_eq!(months.len(), 1);
    assert_eq!(months[0].report_count, 2);
}

#[tokio::test]
async fn agent_lookup_misses_are_none_not_errors() {
    let (_dir, storage) = test_storage().await;

    storage
        .upsert(&report("Anna", "101", 2024, 8, "task-a", 1, 0, 0))
        .await
        .unwrap();

    assert!(storage.query_agent("Anna", 2024, 8).await.unwrap().is_some());
    assert!(storage.query_agent("Anna", 2024, 9).await.unwrap().is_none());
    assert!(storage
        .query_agent("Nobody", 2024, 8)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn agent_lookup_is_case_insensitive() {
    let (_dir, storage) = test_storage().await;

    storage
        .upsert(&report("Anna Petrova", "101", 2024, 8, "task-a", 1, 0, 0))
        .await
        .unwrap();

    let found = storage
        .query_agent("anna petrova", 2024, 8)
        .await
        .unwrap()
        .expect("case-insensitive lookup");
    assert_eq!(found.agent_name, "Anna Petrova");
}

#[tokio::test]
async fn documents_round_trip_through_storage() {
    let (_dir, storage) = test_storage().await;

    let mut original = report("Anna", "101", 2024, 8, "task-a", 10, 4, 0);
    original.incoming_calls.min_wait = Some(DurationField::from_text("00:00:05").unwrap());
    original.consistency_flag = false;
    original.warnings = vec!["incoming.total: unparseable count 'x', coerced to 0".to_string()];

    storage.upsert(&original).await.unwrap();
    let stored = storage
        .query_agent("Anna", 2024, 8)
        .await
        .unwrap()
        .expect("stored document");

    assert_eq!(stored.agent_number, "101");
    assert!(!stored.consistency_flag);
    assert_eq!(stored.warnings, original.warnings);
    assert_eq!(
        stored.incoming_calls.min_wait.as_ref().map(|d| d.as_str()),
        Some("00:00:05")
    );
    assert_eq!(stored.incoming_calls.total_time.seconds(), Some(3600));
    assert_eq!(stored.last_updated, original.last_updated);
}

#[tokio::test]
async fn monthly_statistics_aggregate_call_totals() {
    let (_dir, storage) = test_storage().await;
    let queries = QueryService::new(storage.clone());

    storage
        .upsert(&report("Anna", "101", 2024, 8, "task-a", 10, 0, 0))
        .await
        .unwrap();
    storage
        .upsert(&report("Boris", "102", 2024, 8, "task-a", 5, 3, 0))
        .await
        .unwrap();

    let stats = queries.monthly_statistics(2024, 8).await.unwrap();
    assert_eq!(stats.total_agents, 2);
    assert_eq!(stats.total_reports, 1);
    assert_eq!(stats.total_incoming_calls, 15);
    assert_eq!(stats.total_outgoing_calls, 3);
    assert_eq!(stats.total_calls, 18);
    assert_eq!(stats.agents_with_calls, 2);
    assert_eq!(stats.average_calls_per_agent, 9.0);
    assert_eq!(stats.month_name, "August");
}

#[tokio::test]
async fn monthly_statistics_read_only_the_latest_task() {
    let (_dir, storage) = test_storage().await;
    let queries = QueryService::new(storage.clone());

    // An earlier task saw two agents; a re-scrape a few seconds later saw one.
    storage
        .upsert(&report("Anna", "101", 2024, 8, "task-old", 10, 0, 0))
        .await
        .unwrap();
    storage
        .upsert(&report("Boris", "102", 2024, 8, "task-old", 6, 0, 1))
        .await
        .unwrap();
    storage
        .upsert(&report("Anna", "101", 2024, 8, "task-new", 12, 0, 30))
        .await
        .unwrap();

    let stats = queries.monthly_statistics(2024, 8).await.unwrap();
    assert_eq!(stats.total_reports, 2);
    assert_eq!(stats.total_agents, 1);
    assert_eq!(stats.total_incoming_calls, 12);
}

#[tokio::test]
async fn statistics_for_unknown_month_is_no_data() {
    let (_dir, storage) = test_storage().await;
    let queries = QueryService::new(storage.clone());

    let err = queries.monthly_statistics(2024, 8).await.unwrap_err();
    assert!(matches!(
        err,
        QueryError::NoData {
            year: 2024,
            month: 8
        }
    ));
}

#[tokio::test]
async fn zero_call_month_is_not_no_data() {
    let (_dir, storage) = test_storage().await;
    let queries = QueryService::new(storage.clone());

    storage
        .upsert(&report("Anna", "101", 2024, 8, "task-a", 0, 0, 0))
        .await
        .unwrap();

    let stats = queries.monthly_statistics(2024, 8).await.unwrap();
    assert_eq!(stats.total_agents, 1);
    assert_eq!(stats.total_calls, 0);
    assert_eq!(stats.agents_with_calls, 0);
    assert_eq!(stats.average_calls_per_agent, 0.0);
}

#[tokio::test]
async fn ranking_orders_by_calls_then_name() {
    let (_dir, storage) = test_storage().await;
    let queries = QueryService::new(storage.clone());

    storage
        .upsert(&report("Vera", "103", 2024, 8, "task-a", 5, 5, 0))
        .await
        .unwrap();
    storage
        .upsert(&report("Anna", "101", 2024, 8, "task-a", 10, 0, 0))
        .await
        .unwrap();
    storage
        .upsert(&report("Boris", "102", 2024, 8, "task-a", 20, 1, 0))
        .await
        .unwrap();

    let first = queries.performance_ranking().await.unwrap();
    let names: Vec<&str> = first.iter().map(|r| r.agent_name.as_str()).collect();
    // Boris 21, then the 10-call tie broken by name: Anna before Vera.
    assert_eq!(names, ["Boris", "Anna", "Vera"]);

    // Deterministic across repeated calls.
    let second = queries.performance_ranking().await.unwrap();
    let again: Vec<&str> = second.iter().map(|r| r.agent_name.as_str()).collect();
    assert_eq!(names, again);
}

#[tokio::test]
async fn ranking_sums_across_months_without_double_counting() {
    let (_dir, storage) = test_storage().await;
    let queries = QueryService::new(storage.clone());

    storage
        .upsert(&report("Anna", "101", 2024, 8, "task-old", 99, 0, 0))
        .await
        .unwrap();
    storage
        .upsert(&report("Anna", "101", 2024, 8, "task-new", 10, 0, 30))
        .await
        .unwrap();
    storage
        .upsert(&report("Anna", "101", 2024, 9, "task-sep", 7, 0, 0))
        .await
        .unwrap();

    let ranking = queries.performance_ranking().await.unwrap();
    assert_eq!(ranking.len(), 1);
    // August counts only the latest task (10), September adds 7.
    assert_eq!(ranking[0].total_calls, 17);
    assert_eq!(ranking[0].months_reported, 2);
}
