//! Health check handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use diesel::prelude::*;
use std::sync::Arc;

use crate::core::shared::state::AppState;

fn database_reachable(state: &AppState) -> bool {
    match state.conn.get() {
        Ok(mut conn) => diesel::sql_query("SELECT 1").execute(&mut conn).is_ok(),
        Err(e) => {
            log::warn!("Health check could not get a database connection: {}", e);
            false
        }
    }
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let check_state = Arc::clone(&state);
    let db_ok = tokio::task::spawn_blocking(move || database_reachable(&check_state))
        .await
        .unwrap_or(false);

    let status = if db_ok { "healthy" } else { "degraded" };
    let code = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(serde_json::json!({
            "status": status,
            "service": "learnserver",
            "version": env!("CARGO_PKG_VERSION"),
            "database": db_ok
        })),
    )
}

pub async fn health_check_simple() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "learnserver",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}
