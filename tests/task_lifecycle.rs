//! Task-lifecycle integration tests: scripted scraper doubles drive the
//! manager through its terminal states against a real SQLite store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tempfile::tempdir;

use callwatchd::report::model::{RawReport, RawRow};
use callwatchd::scraper::{Credentials, ReportScraper, ScrapeError};
use callwatchd::storage::Storage;
use callwatchd::tasks::{Period, ScrapeTask, TaskError, TaskManager, TaskStatus};

const COLUMNS: usize = 19;

fn headers() -> Vec<String> {
    (0..COLUMNS).map(|i| format!("col{i}")).collect()
}

fn agent_row(number: &str, name: &str, incoming_total: u32) -> RawRow {
    let mut cells = vec![number.to_string(), name.to_string()];
    // Incoming: total, unsuccessful, successful, four times, three waits.
    cells.push(incoming_total.to_string());
    cells.push("0".to_string());
    cells.push(incoming_total.to_string());
    cells.extend(std::iter::repeat("00:01:00".to_string()).take(7));
    // Outgoing: total, unsuccessful, successful, four times.
    cells.extend(["2", "1", "1"].map(String::from));
    cells.extend(std::iter::repeat("00:00:30".to_string()).take(4));
    assert_eq!(cells.len(), COLUMNS);
    RawRow { cells }
}

fn raw_report(rows: Vec<RawRow>) -> RawReport {
    RawReport {
        headers: headers(),
        rows,
        scraped_at: Utc::now(),
        source_url: "http://portal.test/public/agent_report/".to_string(),
        pages_processed: 1,
    }
}

/// Always returns the same fixed table.
struct FixedScraper(RawReport);

#[async_trait]
impl ReportScraper for FixedScraper {
    async fn run(&self, _credentials: &Credentials) -> Result<RawReport, ScrapeError> {
        Ok(self.0.clone())
    }
}

/// Authenticates fine, then times out mid-extraction.
struct MidExtractionTimeoutScraper;

#[async_trait]
impl ReportScraper for MidExtractionTimeoutScraper {
    async fn run(&self, _credentials: &Credentials) -> Result<RawReport, ScrapeError> {
        Err(ScrapeError::Timeout {
            step: "extract-rows",
            secs: 30,
        })
    }
}

struct RejectedLoginScraper;

#[async_trait]
impl ReportScraper for RejectedLoginScraper {
    async fn run(&self, _credentials: &Credentials) -> Result<RawReport, ScrapeError> {
        Err(ScrapeError::Authentication)
    }
}

fn credentials() -> Credentials {
    Credentials::new("agent-admin", "hunter2")
}

async fn manager_with(
    scraper: Arc<dyn ReportScraper>,
) -> (tempfile::TempDir, Storage, TaskManager) {
    let dir = tempdir().unwrap();
    let storage = Storage::new(dir.path()).await.unwrap();
    let manager = TaskManager::new(scraper, storage.clone(), 2);
    (dir, storage, manager)
}

async fn wait_terminal(manager: &TaskManager, task_id: &str) -> ScrapeTask {
    for _ in 0..500 {
        if let Some(task) = manager.get(task_id).await {
            if task.status.is_terminal() {
                return task;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {task_id} never reached a terminal state");
}

#[tokio::test]
async fn missing_credentials_are_rejected_before_scheduling() {
    let (_dir, _storage, manager) =
        manager_with(Arc::new(FixedScraper(raw_report(vec![])))).await;

    let err = manager
        .start(Credentials::new("agent-admin", ""), None)
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::InvalidCredentials));
    assert!(manager.list().await.is_empty());
}

#[tokio::test]
async fn out_of_range_month_is_rejected() {
    let (_dir, _storage, manager) =
        manager_with(Arc::new(FixedScraper(raw_report(vec![])))).await;

    let err = manager
        .start(
            credentials(),
            Some(Period {
                year: 2024,
                month: 13,
            }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::InvalidPeriod(13)));
}

#[tokio::test]
async fn successful_run_completes_and_persists_reports() {
    let scraper = Arc::new(FixedScraper(raw_report(vec![
        agent_row("101", "Anna", 10),
        agent_row("102", "Boris", 4),
    ])));
    let (_dir, storage, manager) = manager_with(scraper).await;

    let task_id = manager
        .start(
            credentials(),
            Some(Period {
                year: 2024,
                month: 8,
            }),
        )
        .await
        .unwrap();
    assert!(task_id.starts_with("task-"));

    let task = wait_terminal(&manager, &task_id).await;
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.completed_at.is_some());
    assert!(task.error.is_none());

    let result = task.result.expect("completed task carries a result");
    assert_eq!(result.rows_scraped, 2);
    assert_eq!(result.agents_saved, 2);
    assert!(result.warnings.is_empty());

    let stored = storage.query_month(2024, 8).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|r| r.task_id == task_id));
    assert_eq!(stored[0].agent_name, "Anna");
    assert_eq!(stored[0].incoming_calls.total, 10);
}

#[tokio::test]
async fn timeout_mid_extraction_fails_task_and_leaves_store_untouched() {
    let (_dir, storage, manager) = manager_with(Arc::new(MidExtractionTimeoutScraper)).await;

    let task_id = manager
        .start(
            credentials(),
            Some(Period {
                year: 2024,
                month: 8,
            }),
        )
        .await
        .unwrap();

    let task = wait_terminal(&manager, &task_id).await;
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.result.is_none());
    let reason = task.error.expect("failed task carries a reason");
    assert!(reason.contains("extract-rows"), "unexpected reason: {reason}");

    assert!(storage.query_month(2024, 8).await.unwrap().is_empty());
    assert!(storage.query_task(&task_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn rejected_login_fails_task_with_auth_reason() {
    let (_dir, _storage, manager) = manager_with(Arc::new(RejectedLoginScraper)).await;

    let task_id = manager.start(credentials(), None).await.unwrap();
    let task = wait_terminal(&manager, &task_id).await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task
        .error
        .expect("failure reason")
        .contains("rejected the login"));
}

#[tokio::test]
async fn empty_scrape_fails_normalization() {
    let (_dir, storage, manager) =
        manager_with(Arc::new(FixedScraper(raw_report(vec![])))).await;

    let task_id = manager.start(credentials(), None).await.unwrap();
    let task = wait_terminal(&manager, &task_id).await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task
        .error
        .expect("failure reason")
        .contains("contained no rows"));
    assert!(storage.query_task(&task_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_identical_requests_stay_independent() {
    let scraper = Arc::new(FixedScraper(raw_report(vec![agent_row("101", "Anna", 3)])));
    let (_dir, storage, manager) = manager_with(scraper).await;

    let period = Some(Period {
        year: 2024,
        month: 8,
    });
    let first = manager.start(credentials(), period).await.unwrap();
    let second = manager.start(credentials(), period).await.unwrap();
    assert_ne!(first, second);

    let first_task = wait_terminal(&manager, &first).await;
    let second_task = wait_terminal(&manager, &second).await;
    assert_eq!(first_task.status, TaskStatus::Completed);
    assert_eq!(second_task.status, TaskStatus::Completed);

    // Both tasks wrote their own documents for the same partition.
    let stored = storage.query_month(2024, 8).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(manager.list().await.len(), 2);
}

#[tokio::test]
async fn unknown_task_lookup_is_none() {
    let (_dir, _storage, manager) =
        manager_with(Arc::new(FixedScraper(raw_report(vec![])))).await;
    assert!(manager.get("task-unknown").await.is_none());
}
