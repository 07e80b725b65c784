//! Scrape-task lifecycle.
//!
//! One task = one asynchronous scrape-and-store execution. The registry is
//! the only shared mutable state between concurrent executions; it lives
//! behind an RwLock and tasks are replaced wholesale under the write lock,
//! so status reads never observe a half-applied transition. Terminal tasks
//! are never mutated again and never deleted here — retention is an
//! operational concern outside this module.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{RwLock, Semaphore};
use tracing::{info, warn};
use ulid::Ulid;

use crate::report::normalizer::{self, NormalizeError};
use crate::scraper::{Credentials, ReportScraper, ScrapeError};
use crate::storage::Storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Summary counts recorded on a completed task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub rows_scraped: usize,
    pub agents_saved: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScrapeTask {
    pub task_id: String,
    pub status: TaskStatus,
    /// Target partition the scrape writes into.
    pub year: i32,
    pub month: u32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<TaskResult>,
    pub error: Option<String>,
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("username and password are required")]
    InvalidCredentials,

    #[error("month must be 1-12, got {0}")]
    InvalidPeriod(u32),
}

/// The (year, month) partition a scrape targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn current() -> Self {
        let now = Utc::now();
        Self {
            year: now.year(),
            month: now.month(),
        }
    }

    /// The period `steps` whole months before this one.
    pub fn months_back(self, steps: u32) -> Self {
        let mut year = self.year;
        let mut month = self.month;
        for _ in 0..steps {
            if month == 1 {
                month = 12;
                year -= 1;
            } else {
                month -= 1;
            }
        }
        Self { year, month }
    }
}

type TaskRegistry = Arc<RwLock<HashMap<String, ScrapeTask>>>;

pub struct TaskManager {
    tasks: TaskRegistry,
    /// Fixed-size worker pool: at most this many scrape sessions at once.
    permits: Arc<Semaphore>,
    scraper: Arc<dyn ReportScraper>,
    store: Storage,
}

impl TaskManager {
    pub fn new(scraper: Arc<dyn ReportScraper>, store: Storage, max_concurrent: usize) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            scraper,
            store,
        }
    }

    /// Register a pending task and schedule its background execution.
    ///
    /// Returns as soon as the task id is assigned — never waits on the
    /// scraper. Identical concurrent requests get fully independent tasks;
    /// in-flight requests are deliberately not deduplicated.
    pub async fn start(
        &self,
        credentials: Credentials,
        period: Option<Period>,
    ) -> Result<String, TaskError> {
        if !credentials.is_complete() {
            return Err(TaskError::InvalidCredentials);
        }
        let period = period.unwrap_or_else(Period::current);
        if !(1..=12).contains(&period.month) {
            return Err(TaskError::InvalidPeriod(period.month));
        }

        let task_id = format!("task-{}", Ulid::new());
        let task = ScrapeTask {
            task_id: task_id.clone(),
            status: TaskStatus::Pending,
            year: period.year,
            month: period.month,
            created_at: Utc::now(),
            completed_at: None,
            result: None,
            error: None,
        };
        self.tasks.write().await.insert(task_id.clone(), task);
        info!(task_id = %task_id, year = period.year, month = period.month, "scrape task created");

        let tasks = Arc::clone(&self.tasks);
        let permits = Arc::clone(&self.permits);
        let scraper = Arc::clone(&self.scraper);
        let store = self.store.clone();
        let id = task_id.clone();

        tokio::spawn(async move {
            // Bounded pool: the task stays pending until a permit frees up.
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    fail(&tasks, &id, "worker pool shut down").await;
                    return;
                }
            };

            set_running(&tasks, &id).await;
            match execute(scraper.as_ref(), &store, &id, period, &credentials).await {
                Ok(result) => {
                    info!(
                        task_id = %id,
                        agents_saved = result.agents_saved,
                        rows_scraped = result.rows_scraped,
                        "scrape task completed"
                    );
                    complete(&tasks, &id, result).await;
                }
                Err(e) => {
                    warn!(task_id = %id, error = %e, "scrape task failed");
                    fail(&tasks, &id, &e.to_string()).await;
                }
            }
        });

        Ok(task_id)
    }

    pub async fn get(&self, task_id: &str) -> Option<ScrapeTask> {
        self.tasks.read().await.get(task_id).cloned()
    }

    /// All known tasks, newest first.
    pub async fn list(&self) -> Vec<ScrapeTask> {
        let mut tasks: Vec<ScrapeTask> = self.tasks.read().await.values().cloned().collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks
    }
}

#[derive(Debug, Error)]
enum ExecuteError {
    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("store write failed: {0}")]
    Store(#[from] anyhow::Error),
}

/// The task body: scrape → normalize → store.
///
/// Upserts start only after the whole batch has normalized, so a scrape or
/// normalization failure leaves the store untouched for this task.
async fn execute(
    scraper: &dyn ReportScraper,
    store: &Storage,
    task_id: &str,
    period: Period,
    credentials: &Credentials,
) -> Result<TaskResult, ExecuteError> {
    let raw = scraper.run(credentials).await?;
    let rows_scraped = raw.rows.len();

    let batch = normalizer::normalize(&raw, task_id, period.year, period.month)?;

    let mut agents_saved = 0;
    for report in &batch.reports {
        store.upsert(report).await?;
        agents_saved += 1;
    }

    Ok(TaskResult {
        rows_scraped,
        agents_saved,
        warnings: batch.warnings,
    })
}

async fn set_running(tasks: &TaskRegistry, task_id: &str) {
    let mut map = tasks.write().await;
    if let Some(task) = map.get_mut(task_id) {
        if !task.status.is_terminal() {
            task.status = TaskStatus::Running;
        }
    }
}

async fn complete(tasks: &TaskRegistry, task_id: &str, result: TaskResult) {
    let mut map = tasks.write().await;
    if let Some(task) = map.get_mut(task_id) {
        if task.status.is_terminal() {
            return;
        }
        task.status = TaskStatus::Completed;
        task.completed_at = Some(Utc::now());
        task.result = Some(result);
    }
}

async fn fail(tasks: &TaskRegistry, task_id: &str, reason: &str) {
    let mut map = tasks.write().await;
    if let Some(task) = map.get_mut(task_id) {
        if task.status.is_terminal() {
            return;
        }
        task.status = TaskStatus::Failed;
        task.completed_at = Some(Utc::now());
        task.error = Some(reason.to_string());
    }
}
