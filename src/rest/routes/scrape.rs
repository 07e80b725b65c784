// rest/routes/scrape.rs — Scrape-task routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{bad_request, not_found};
use crate::scraper::Credentials;
use crate::tasks::Period;
use crate::AppContext;

/// Historical backfill cap, matching the portal's own retention.
const MAX_MONTHS_BACK: u32 = 24;

#[derive(Debug, Default, Deserialize)]
pub struct ScrapeRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub year: Option<i32>,
    pub month: Option<u32>,
}

/// Request credentials win; the `SCRAPER_USERNAME` / `SCRAPER_PASSWORD`
/// environment variables are the fallback.
fn resolve_credentials(username: Option<String>, password: Option<String>) -> Credentials {
    let username = username
        .filter(|u| !u.is_empty())
        .or_else(|| std::env::var("SCRAPER_USERNAME").ok())
        .unwrap_or_default();
    let password = password
        .filter(|p| !p.is_empty())
        .or_else(|| std::env::var("SCRAPER_PASSWORD").ok())
        .unwrap_or_default();
    Credentials::new(username, password)
}

pub async fn start_scrape(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<ScrapeRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let credentials = resolve_credentials(body.username, body.password);
    let period = match (body.year, body.month) {
        (Some(year), Some(month)) => Some(Period { year, month }),
        _ => None,
    };

    match ctx.tasks.start(credentials, period).await {
        Ok(task_id) => Ok((
            StatusCode::ACCEPTED,
            Json(json!({
                "task_id": task_id,
                "status_url": format!("/api/tasks/{task_id}"),
            })),
        )),
        Err(e) => Err(bad_request(e)),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoricalScrapeRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    /// How many months to walk back from the current one. Default 12.
    pub months_back: Option<u32>,
}

/// Start one independent task per month, newest first, walking back from
/// the current month.
pub async fn start_historical_scrape(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<HistoricalScrapeRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let credentials = resolve_credentials(body.username, body.password);
    let months_back = body.months_back.unwrap_or(12).min(MAX_MONTHS_BACK);

    let current = Period::current();
    let mut tasks = Vec::new();
    for step in 0..months_back {
        let period = current.months_back(step);
        let task_id = ctx
            .tasks
            .start(credentials.clone(), Some(period))
            .await
            .map_err(bad_request)?;
        tasks.push(json!({
            "task_id": task_id,
            "year": period.year,
            "month": period.month,
        }));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "months_scheduled": tasks.len(),
            "tasks": tasks,
        })),
    ))
}

pub async fn get_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match ctx.tasks.get(&id).await {
        Some(task) => Ok(Json(json!({ "task": task }))),
        None => Err(not_found(format!("task '{id}' not found"))),
    }
}

pub async fn list_tasks(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    let tasks = ctx.tasks.list().await;
    Json(json!({
        "total_tasks": tasks.len(),
        "tasks": tasks,
    }))
}
