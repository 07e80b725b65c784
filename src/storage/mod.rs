//! SQLite-backed report store.
//!
//! One row per (agent_name, year, month, task_id) — the document identity.
//! Upserts are idempotent; the latest payload for an identity wins. The
//! monthly composite indexes back every read-path query.

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
use sqlx::{Row as _, SqlitePool};
use std::path::Path;
use std::str::FromStr;

use crate::report::model::{month_name, AgentReport, CallStats};

/// Default timeout for individual SQLite queries.
/// Prevents hung queries from blocking the daemon indefinitely.
const QUERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Execute a future with the standard query timeout.
async fn with_timeout<T>(fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "database query timed out after {}s",
            QUERY_TIMEOUT.as_secs()
        )),
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct AgentReportRow {
    agent_name: String,
    agent_number: String,
    year: i64,
    month: i64,
    task_id: String,
    /// JSON-encoded [`CallStats`].
    incoming_calls: String,
    outgoing_calls: String,
    consistency_flag: bool,
    /// JSON array of row-level warnings.
    warnings: String,
    /// RFC 3339.
    last_updated: String,
}

impl AgentReportRow {
    fn into_report(self) -> Result<AgentReport> {
        let incoming_calls: CallStats = serde_json::from_str(&self.incoming_calls)
            .context("corrupt incoming_calls document")?;
        let outgoing_calls: CallStats = serde_json::from_str(&self.outgoing_calls)
            .context("corrupt outgoing_calls document")?;
        let warnings: Vec<String> =
            serde_json::from_str(&self.warnings).context("corrupt warnings document")?;
        let last_updated = DateTime::parse_from_rfc3339(&self.last_updated)
            .context("corrupt last_updated timestamp")?
            .with_timezone(&Utc);

        Ok(AgentReport {
            agent_name: self.agent_name,
            agent_number: self.agent_number,
            year: self.year as i32,
            month: self.month as u32,
            task_id: self.task_id,
            incoming_calls,
            outgoing_calls,
            consistency_flag: self.consistency_flag,
            warnings,
            last_updated,
        })
    }
}

/// One stored scrape run: the task, its partition, and what it saved.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub task_id: String,
    pub year: i32,
    pub month: u32,
    pub month_year: String,
    pub agent_count: i64,
    pub saved_at: String,
}

/// One (year, month) partition present in the store.
#[derive(Debug, Clone, Serialize)]
pub struct MonthDescriptor {
    pub year: i32,
    pub month: u32,
    pub month_year: String,
    pub month_name: String,
    /// Distinct scrape tasks that wrote into this partition.
    pub report_count: i64,
    pub first_report: String,
    pub last_report: String,
}

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let db_path = data_dir.join("callwatch.db");
        let opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .create_if_missing(true);

        let pool = SqlitePool::connect_with(opts).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        // Idempotent schema creation — safe to run on every startup.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS agent_reports (
                 agent_name       TEXT NOT NULL,
                 agent_number     TEXT NOT NULL DEFAULT '',
                 year             INTEGER NOT NULL,
                 month            INTEGER NOT NULL,
                 task_id          TEXT NOT NULL,
                 incoming_calls   TEXT NOT NULL,
                 outgoing_calls   TEXT NOT NULL,
                 consistency_flag INTEGER NOT NULL DEFAULT 1,
                 warnings         TEXT NOT NULL DEFAULT '[]',
                 last_updated     TEXT NOT NULL,
                 PRIMARY KEY (agent_name, year, month, task_id)
             )",
        )
        .execute(pool)
        .await
        .context("Failed to create agent_reports table")?;

        // Composite indexes for the monthly read paths.
        let index_stmts = [
            "CREATE INDEX IF NOT EXISTS idx_agent_reports_month
               ON agent_reports (year, month)",
            "CREATE INDEX IF NOT EXISTS idx_agent_reports_agent_month
               ON agent_reports (agent_name, year, month)",
            "CREATE INDEX IF NOT EXISTS idx_agent_reports_task
               ON agent_reports (task_id)",
        ];
        for stmt in index_stmts {
            sqlx::query(stmt).execute(pool).await?;
        }

        Ok(())
    }

    /// Insert or replace the document with the same identity. Idempotent —
    /// re-upserting the same key never errors, the latest payload wins.
    pub async fn upsert(&self, report: &AgentReport) -> Result<()> {
        let incoming = serde_json::to_string(&report.incoming_calls)?;
        let outgoing = serde_json::to_string(&report.outgoing_calls)?;
        let warnings = serde_json::to_string(&report.warnings)?;

        sqlx::query(
            "INSERT INTO agent_reports
               (agent_name, agent_number, year, month, task_id,
                incoming_calls, outgoing_calls, consistency_flag, warnings, last_updated)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(agent_name, year, month, task_id) DO UPDATE SET
               agent_number = excluded.agent_number,
               incoming_calls = excluded.incoming_calls,
               outgoing_calls = excluded.outgoing_calls,
               consistency_flag = excluded.consistency_flag,
               warnings = excluded.warnings,
               last_updated = excluded.last_updated",
        )
        .bind(&report.agent_name)
        .bind(&report.agent_number)
        .bind(i64::from(report.year))
        .bind(i64::from(report.month))
        .bind(&report.task_id)
        .bind(&incoming)
        .bind(&outgoing)
        .bind(report.consistency_flag)
        .bind(&warnings)
        // Fixed-width UTC form so MAX/ORDER BY on the text column follow
        // chronological order.
        .bind(
            report
                .last_updated
                .to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Every document in a (year, month) partition, ordered for stable output.
    pub async fn query_month(&self, year: i32, month: u32) -> Result<Vec<AgentReport>> {
        let rows: Vec<AgentReportRow> = with_timeout(async {
            Ok(sqlx::query_as(
                "SELECT * FROM agent_reports
                 WHERE year = ? AND month = ?
                 ORDER BY agent_name ASC, task_id ASC",
            )
            .bind(i64::from(year))
            .bind(i64::from(month))
            .fetch_all(&self.pool)
            .await?)
        })
        .await?;

        rows.into_iter().map(AgentReportRow::into_report).collect()
    }

    /// One agent's document for a month — latest task wins when several
    /// tasks scraped the same partition. Name match is case-insensitive,
    /// matching the portal's own lookups.
    pub async fn query_agent(
        &self,
        name: &str,
        year: i32,
        month: u32,
    ) -> Result<Option<AgentReport>> {
        let row: Option<AgentReportRow> = sqlx::query_as(
            "SELECT * FROM agent_reports
             WHERE agent_name = ? COLLATE NOCASE AND year = ? AND month = ?
             ORDER BY last_updated DESC
             LIMIT 1",
        )
        .bind(name)
        .bind(i64::from(year))
        .bind(i64::from(month))
        .fetch_optional(&self.pool)
        .await?;

        row.map(AgentReportRow::into_report).transpose()
    }

    /// An agent's most recent document across all months.
    pub async fn query_agent_latest(&self, name: &str) -> Result<Option<AgentReport>> {
        let row: Option<AgentReportRow> = sqlx::query_as(
            "SELECT * FROM agent_reports
             WHERE agent_name = ? COLLATE NOCASE
             ORDER BY last_updated DESC
             LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(AgentReportRow::into_report).transpose()
    }

    /// Every document written by one scrape task.
    pub async fn query_task(&self, task_id: &str) -> Result<Vec<AgentReport>> {
        let rows: Vec<AgentReportRow> = sqlx::query_as(
            "SELECT * FROM agent_reports WHERE task_id = ? ORDER BY agent_name ASC",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AgentReportRow::into_report).collect()
    }

    /// Distinct agent names across the whole store.
    pub async fn list_agent_names(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = with_timeout(async {
            Ok(sqlx::query_as(
                "SELECT DISTINCT agent_name FROM agent_reports ORDER BY agent_name ASC",
            )
            .fetch_all(&self.pool)
            .await?)
        })
        .await?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// The task that most recently wrote into a (year, month) partition.
    pub async fn latest_task_id(&self, year: i32, month: u32) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT task_id FROM agent_reports
             WHERE year = ? AND month = ?
             ORDER BY last_updated DESC
             LIMIT 1",
        )
        .bind(i64::from(year))
        .bind(i64::from(month))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(task_id,)| task_id))
    }

    /// Recent scrape runs, newest first: one summary per task that wrote
    /// documents, with the partition it targeted and its agent count.
    pub async fn list_recent_reports(&self, limit: i64) -> Result<Vec<ReportSummary>> {
        let rows = with_timeout(async {
            Ok(sqlx::query(
                "SELECT task_id, year, month,
                        COUNT(*) AS agent_count,
                        MAX(last_updated) AS saved_at
                 FROM agent_reports
                 GROUP BY task_id, year, month
                 ORDER BY saved_at DESC
                 LIMIT ?",
            )
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
        })
        .await?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let year: i64 = row.get("year");
            let month: i64 = row.get("month");
            summaries.push(ReportSummary {
                task_id: row.get("task_id"),
                year: year as i32,
                month: month as u32,
                month_year: format!("{year:04}-{month:02}"),
                agent_count: row.get("agent_count"),
                saved_at: row.get("saved_at"),
            });
        }
        Ok(summaries)
    }

    /// Every (year, month) partition, newest first, with the number of
    /// distinct tasks that wrote into it.
    pub async fn list_months(&self) -> Result<Vec<MonthDescriptor>> {
        let rows = with_timeout(async {
            Ok(sqlx::query(
                "SELECT year, month,
                        COUNT(DISTINCT task_id) AS report_count,
                        MIN(last_updated) AS first_report,
                        MAX(last_updated) AS last_report
                 FROM agent_reports
                 GROUP BY year, month
                 ORDER BY year DESC, month DESC",
            )
            .fetch_all(&self.pool)
            .await?)
        })
        .await?;

        let mut months = Vec::with_capacity(rows.len());
        for row in rows {
            let year: i64 = row.get("year");
            let month: i64 = row.get("month");
            months.push(MonthDescriptor {
                year: year as i32,
                month: month as u32,
                month_year: format!("{year:04}-{month:02}"),
                month_name: month_name(month as u32).to_string(),
                report_count: row.get("report_count"),
                first_report: row.get("first_report"),
                last_report: row.get("last_report"),
            });
        }
        Ok(months)
    }
}
