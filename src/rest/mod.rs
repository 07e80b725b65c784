// rest/mod.rs — Public REST API server.
//
// Thin axum handlers over the scrape/report core. Routing and JSON shaping
// only — every decision lives in tasks/, query/, or storage/.
//
// Endpoints:
//   GET  /api/health
//   POST /api/scrape
//   POST /api/scrape/historical
//   GET  /api/tasks
//   GET  /api/tasks/{id}
//   GET  /api/agents
//   GET  /api/agents/{name}
//   GET  /api/agents/{year}/{month}
//   GET  /api/agents/{name}/{year}/{month}
//   GET  /api/reports
//   GET  /api/reports/{task_id}
//   GET  /api/reports/{year}/{month}
//   GET  /api/months
//   GET  /api/statistics/{year}/{month}
//   GET  /api/performance

pub mod routes;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::AppContext;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("REST API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/api/health", get(routes::health::health))
        // Scrape tasks
        .route("/api/scrape", post(routes::scrape::start_scrape))
        .route(
            "/api/scrape/historical",
            post(routes::scrape::start_historical_scrape),
        )
        .route("/api/tasks", get(routes::scrape::list_tasks))
        .route("/api/tasks/{id}", get(routes::scrape::get_task))
        // Agents and reports
        .route("/api/agents", get(routes::reports::list_agents))
        .route("/api/agents/{name}", get(routes::reports::get_agent))
        .route(
            "/api/agents/{year}/{month}",
            get(routes::reports::agents_by_month),
        )
        .route(
            "/api/agents/{name}/{year}/{month}",
            get(routes::reports::get_agent_month),
        )
        .route("/api/reports", get(routes::reports::list_reports))
        .route(
            "/api/reports/{task_id}",
            get(routes::reports::reports_by_task),
        )
        .route(
            "/api/reports/{year}/{month}",
            get(routes::reports::reports_by_month),
        )
        // Monthly views
        .route("/api/months", get(routes::reports::list_months))
        .route(
            "/api/statistics/{year}/{month}",
            get(routes::reports::monthly_statistics),
        )
        .route("/api/performance", get(routes::reports::performance_ranking))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
