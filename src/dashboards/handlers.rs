use axum::{extract::State, response::IntoResponse, Extension};
use std::sync::Arc;

use super::DashboardEngine;
use crate::core::shared::error::ApiError;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::ok_json;
use crate::security::auth_api::AuthenticatedUser;

pub async fn handle_role_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = DashboardEngine::new(state.conn.clone());
    Ok(ok_json(engine.for_user(&user).await?))
}

pub async fn handle_admin_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = DashboardEngine::new(state.conn.clone());
    Ok(ok_json(engine.admin(&user).await?))
}

pub async fn handle_formateur_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = DashboardEngine::new(state.conn.clone());
    Ok(ok_json(engine.formateur(&user).await?))
}

pub async fn handle_student_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = DashboardEngine::new(state.conn.clone());
    Ok(ok_json(engine.student(&user).await?))
}
