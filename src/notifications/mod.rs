//! In-app notifications: storage, fan-out helpers used by the workflows, and the
//! endpoints users read them through.

pub mod service;
pub mod types;

pub use service::{notify, notify_many, notify_role, NotificationEngine};
pub use types::{Notification, NotificationDraft, NotificationType};

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::shared::error::ApiError;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{message_json, ok_json};
use crate::core::urls::ApiUrls;
use crate::security::auth_api::{AuthenticatedUser, Permission};
use types::{BroadcastRequest, NotificationFilters};

pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(filters): Query<NotificationFilters>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(&Permission::ReadNotifications)?;
    let engine = NotificationEngine::new(state.conn.clone());
    let items = engine.list(user.user_id, &filters).await?;
    Ok(ok_json(items))
}

pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(&Permission::ReadNotifications)?;
    let engine = NotificationEngine::new(state.conn.clone());
    let count = engine.unread_count(user.user_id).await?;
    Ok(ok_json(serde_json::json!({ "count": count })))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(&Permission::ReadNotifications)?;
    let engine = NotificationEngine::new(state.conn.clone());
    Ok(ok_json(engine.mark_read(user.user_id, id).await?))
}

pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(&Permission::ReadNotifications)?;
    let engine = NotificationEngine::new(state.conn.clone());
    let updated = engine.mark_all_read(user.user_id).await?;
    Ok(ok_json(serde_json::json!({ "updated": updated })))
}

pub async fn delete_notification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(&Permission::ReadNotifications)?;
    let engine = NotificationEngine::new(state.conn.clone());
    engine.delete(user.user_id, id).await?;
    Ok(message_json("Notification deleted"))
}

pub async fn broadcast(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(req): Json<BroadcastRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(&Permission::BroadcastNotifications)?;
    let engine = NotificationEngine::new(state.conn.clone());
    let sent = engine
        .broadcast(user.user_id, req.role, &req.title, &req.message, req.link)
        .await?;
    Ok(ok_json(serde_json::json!({ "sent": sent })))
}

pub fn configure_notification_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::NOTIFICATIONS, get(list_notifications))
        .route(ApiUrls::NOTIFICATIONS_UNREAD_COUNT, get(unread_count))
        .route(ApiUrls::NOTIFICATIONS_READ_ALL, post(mark_all_read))
        .route(ApiUrls::NOTIFICATIONS_BROADCAST, post(broadcast))
        .route(ApiUrls::NOTIFICATION_READ, post(mark_read))
        .route(
            ApiUrls::NOTIFICATION_BY_ID,
            axum::routing::delete(delete_notification),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_addressing() {
        let draft = NotificationDraft::new(
            NotificationType::Enrollment,
            "Enrollment approved",
            "Welcome to Rust 101",
        )
        .with_link(ApiUrls::course("c-1"));

        let user_id = Uuid::new_v4();
        let row = draft.addressed_to(user_id);
        assert_eq!(row.user_id, user_id);
        assert_eq!(row.notification_type, "enrollment");
        assert_eq!(row.link.as_deref(), Some("/api/courses/c-1"));
        assert!(!row.read);
        assert_ne!(row.id, draft.addressed_to(user_id).id);
    }

    #[test]
    fn test_broadcast_request_role_is_optional() {
        let req: BroadcastRequest =
            serde_json::from_str(r#"{"title":"Maintenance","message":"Tonight"}"#).unwrap();
        assert!(req.role.is_none());

        let req: BroadcastRequest = serde_json::from_str(
            r#"{"role":"formateur","title":"Maintenance","message":"Tonight"}"#,
        )
        .unwrap();
        assert_eq!(req.role, Some(crate::directory::UserRole::Formateur));
    }
}
