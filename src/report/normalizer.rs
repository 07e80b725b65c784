//! Normalizer — turns one raw scraped table into typed [`AgentReport`]s.
//!
//! Fault policy: row-level problems (short rows, unparseable counts,
//! malformed durations, inconsistent totals) are recovered locally and
//! recorded as warnings or the consistency flag; only table-level problems
//! (no rows at all, broken header) fail the whole pass.

use chrono::Utc;
use thiserror::Error;

use super::model::{AgentReport, CallStats, DurationField, RawReport};

/// Portal table column layout (0-based): two identity columns, ten
/// incoming-call columns, seven outgoing-call columns. A trailing actions
/// column may follow; it is ignored.
const COL_AGENT_NUMBER: usize = 0;
const COL_AGENT_NAME: usize = 1;
const EXPECTED_COLUMNS: usize = 19;

struct DirectionLayout {
    label: &'static str,
    total: usize,
    unsuccessful: usize,
    successful: usize,
    min_time: usize,
    max_time: usize,
    avg_time: usize,
    total_time: usize,
    /// (min_wait, max_wait, avg_wait) — incoming only.
    waits: Option<(usize, usize, usize)>,
}

const INCOMING: DirectionLayout = DirectionLayout {
    label: "incoming",
    total: 2,
    unsuccessful: 3,
    successful: 4,
    min_time: 5,
    max_time: 6,
    avg_time: 7,
    total_time: 8,
    waits: Some((9, 10, 11)),
};

const OUTGOING: DirectionLayout = DirectionLayout {
    label: "outgoing",
    total: 12,
    unsuccessful: 13,
    successful: 14,
    min_time: 15,
    max_time: 16,
    avg_time: 17,
    total_time: 18,
    waits: None,
};

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("scraped report contained no rows")]
    EmptyReport,
    #[error("report table schema mismatch: {0}")]
    Schema(String),
}

/// The output of one normalization pass: the documents to store plus
/// batch-level warnings for rows that could not be turned into documents.
#[derive(Debug, Clone)]
pub struct NormalizedBatch {
    pub reports: Vec<AgentReport>,
    pub warnings: Vec<String>,
}

/// Normalize a raw report into one [`AgentReport`] per usable table row,
/// stamped with the task that produced it and the target month partition.
pub fn normalize(
    raw: &RawReport,
    task_id: &str,
    year: i32,
    month: u32,
) -> Result<NormalizedBatch, NormalizeError> {
    if raw.rows.is_empty() {
        return Err(NormalizeError::EmptyReport);
    }
    if raw.headers.len() < EXPECTED_COLUMNS {
        return Err(NormalizeError::Schema(format!(
            "expected at least {EXPECTED_COLUMNS} header columns, portal sent {}",
            raw.headers.len()
        )));
    }

    let mut reports = Vec::with_capacity(raw.rows.len());
    let mut warnings = Vec::new();

    for (idx, row) in raw.rows.iter().enumerate() {
        if row.cells.len() < EXPECTED_COLUMNS {
            warnings.push(format!(
                "row {idx}: {} cells, expected {EXPECTED_COLUMNS} — skipped",
                row.cells.len()
            ));
            continue;
        }

        let agent_number = row.cells[COL_AGENT_NUMBER].trim().to_string();
        let agent_name = row.cells[COL_AGENT_NAME].trim().to_string();
        if agent_name.is_empty() {
            warnings.push(format!("row {idx}: empty agent name — skipped"));
            continue;
        }

        let mut row_warnings = Vec::new();
        let incoming = direction_stats(&row.cells, &INCOMING, &mut row_warnings);
        let outgoing = direction_stats(&row.cells, &OUTGOING, &mut row_warnings);
        let consistency_flag = incoming.is_consistent() && outgoing.is_consistent();

        reports.push(AgentReport {
            agent_name,
            agent_number,
            year,
            month,
            task_id: task_id.to_string(),
            incoming_calls: incoming,
            outgoing_calls: outgoing,
            consistency_flag,
            warnings: row_warnings,
            last_updated: Utc::now(),
        });
    }

    Ok(NormalizedBatch { reports, warnings })
}

fn direction_stats(
    cells: &[String],
    layout: &DirectionLayout,
    warnings: &mut Vec<String>,
) -> CallStats {
    let (min_wait, max_wait, avg_wait) = match layout.waits {
        Some((min, max, avg)) => (
            Some(duration_cell(cells, min, layout.label, "min_wait", warnings)),
            Some(duration_cell(cells, max, layout.label, "max_wait", warnings)),
            Some(duration_cell(cells, avg, layout.label, "avg_wait", warnings)),
        ),
        None => (None, None, None),
    };

    CallStats {
        total: count_cell(cells, layout.total, layout.label, "total", warnings),
        unsuccessful: count_cell(cells, layout.unsuccessful, layout.label, "unsuccessful", warnings),
        successful: count_cell(cells, layout.successful, layout.label, "successful", warnings),
        min_time: duration_cell(cells, layout.min_time, layout.label, "min_time", warnings),
        max_time: duration_cell(cells, layout.max_time, layout.label, "max_time", warnings),
        avg_time: duration_cell(cells, layout.avg_time, layout.label, "avg_time", warnings),
        total_time: duration_cell(cells, layout.total_time, layout.label, "total_time", warnings),
        min_wait,
        max_wait,
        avg_wait,
    }
}

/// Parse a count cell; empty means zero, garbage coerces to zero with a warning.
fn count_cell(
    cells: &[String],
    idx: usize,
    direction: &str,
    field: &str,
    warnings: &mut Vec<String>,
) -> u32 {
    let text = cells[idx].trim();
    if text.is_empty() {
        return 0;
    }
    match text.parse() {
        Ok(n) => n,
        Err(_) => {
            warnings.push(format!(
                "{direction}.{field}: unparseable count '{text}', coerced to 0"
            ));
            0
        }
    }
}

/// Validate a duration cell; malformed text coerces to empty with a warning.
fn duration_cell(
    cells: &[String],
    idx: usize,
    direction: &str,
    field: &str,
    warnings: &mut Vec<String>,
) -> DurationField {
    let text = cells[idx].trim();
    match DurationField::from_text(text) {
        Ok(value) => value,
        Err(_) => {
            warnings.push(format!(
                "{direction}.{field}: malformed duration '{text}', coerced to empty"
            ));
            DurationField::empty()
        }
    }
}
