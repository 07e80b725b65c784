use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::AppContext;

pub async fn health(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    Json(json!({
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": ctx.started_at.elapsed().as_secs(),
        "environment_check": {
            "has_username": std::env::var("SCRAPER_USERNAME").is_ok(),
            "has_password": std::env::var("SCRAPER_PASSWORD").is_ok(),
            "portal_configured": !ctx.config.portal.base_url.is_empty(),
        },
    }))
}
