// rest/routes/reports.rs — Read-side report and monthly-view routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use super::{internal, not_found};
use crate::query::QueryError;
use crate::AppContext;

pub async fn list_agents(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let agents = ctx.storage.list_agent_names().await.map_err(internal)?;
    Ok(Json(json!({
        "total_agents": agents.len(),
        "agents": agents,
    })))
}

pub async fn get_agent(
    State(ctx): State<Arc<AppContext>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match ctx.storage.query_agent_latest(&name).await.map_err(internal)? {
        Some(report) => Ok(Json(json!({ "agent": report }))),
        None => Err(not_found(format!("agent '{name}' not found"))),
    }
}

pub async fn agents_by_month(
    State(ctx): State<Arc<AppContext>>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    // The month's agent view comes from the latest task only, so re-scrapes
    // replace rather than duplicate the roster.
    let latest = ctx
        .storage
        .latest_task_id(year, month)
        .await
        .map_err(internal)?;
    let reports = match latest {
        Some(task_id) => ctx
            .storage
            .query_month(year, month)
            .await
            .map_err(internal)?
            .into_iter()
            .filter(|r| r.task_id == task_id)
            .collect(),
        None => Vec::new(),
    };

    Ok(Json(json!({
        "year": year,
        "month": month,
        "total_agents": reports.len(),
        "agents": reports,
    })))
}

pub async fn get_agent_month(
    State(ctx): State<Arc<AppContext>>,
    Path((name, year, month)): Path<(String, i32, u32)>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match ctx
        .storage
        .query_agent(&name, year, month)
        .await
        .map_err(internal)?
    {
        Some(report) => Ok(Json(json!({
            "year": year,
            "month": month,
            "agent": report,
        }))),
        None => Err(not_found(format!(
            "agent '{name}' not found for {year}-{month:02}"
        ))),
    }
}

pub async fn list_reports(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let reports = ctx
        .storage
        .list_recent_reports(10)
        .await
        .map_err(internal)?;
    Ok(Json(json!({
        "total_reports": reports.len(),
        "reports": reports,
    })))
}

pub async fn reports_by_task(
    State(ctx): State<Arc<AppContext>>,
    Path(task_id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let reports = ctx.storage.query_task(&task_id).await.map_err(internal)?;
    if reports.is_empty() {
        return Err(not_found(format!("no reports stored for task '{task_id}'")));
    }
    Ok(Json(json!({
        "task_id": task_id,
        "total_reports": reports.len(),
        "reports": reports,
    })))
}

pub async fn reports_by_month(
    State(ctx): State<Arc<AppContext>>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let reports = ctx.storage.query_month(year, month).await.map_err(internal)?;
    Ok(Json(json!({
        "year": year,
        "month": month,
        "total_reports": reports.len(),
        "reports": reports,
    })))
}

pub async fn list_months(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let months = ctx.queries.available_months().await.map_err(internal)?;
    Ok(Json(json!({
        "total_months": months.len(),
        "months": months,
    })))
}

pub async fn monthly_statistics(
    State(ctx): State<Arc<AppContext>>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match ctx.queries.monthly_statistics(year, month).await {
        Ok(statistics) => Ok(Json(json!({ "statistics": statistics }))),
        Err(e @ QueryError::NoData { .. }) => Err(not_found(e.to_string())),
        Err(e) => Err(internal(e)),
    }
}

pub async fn performance_ranking(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let ranking = ctx.queries.performance_ranking().await.map_err(internal)?;
    Ok(Json(json!({
        "total_agents": ranking.len(),
        "ranking": ranking,
    })))
}
