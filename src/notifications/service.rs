use chrono::Utc;
use diesel::prelude::*;
use diesel::PgConnection;
use tracing::info;
use uuid::Uuid;

use super::types::{Notification, NotificationDraft, NotificationFilters, NotificationType};
use crate::core::shared::error::ApiError;
use crate::core::shared::schema::{notifications, users};
use crate::core::shared::utils::{page, with_conn, DbPool};
use crate::directory::{UserRole, UserStatus};

// ============================================================================
// FAN-OUT
// ============================================================================
// These take a connection so callers can run them inside their own transaction.

pub fn notify(
    conn: &mut PgConnection,
    user_id: Uuid,
    draft: &NotificationDraft,
) -> QueryResult<Notification> {
    diesel::insert_into(notifications::table)
        .values(draft.addressed_to(user_id))
        .get_result(conn)
}

pub fn notify_many(
    conn: &mut PgConnection,
    user_ids: &[Uuid],
    draft: &NotificationDraft,
) -> QueryResult<usize> {
    let mut recipients = user_ids.to_vec();
    recipients.sort();
    recipients.dedup();
    if recipients.is_empty() {
        return Ok(0);
    }

    let rows: Vec<_> = recipients.iter().map(|id| draft.addressed_to(*id)).collect();
    diesel::insert_into(notifications::table)
        .values(&rows)
        .execute(conn)
}

/// Notifies every active user holding `role`.
pub fn notify_role(
    conn: &mut PgConnection,
    role: UserRole,
    draft: &NotificationDraft,
) -> QueryResult<usize> {
    let recipients: Vec<Uuid> = users::table
        .filter(users::role.eq(role.as_str()))
        .filter(users::status.eq(UserStatus::Active.as_str()))
        .select(users::id)
        .load(conn)?;
    notify_many(conn, &recipients, draft)
}

// ============================================================================
// NOTIFICATION ENGINE
// ============================================================================

pub struct NotificationEngine {
    db: DbPool,
}

impl NotificationEngine {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        filters: &NotificationFilters,
    ) -> Result<Vec<Notification>, ApiError> {
        let (limit, offset) = page(filters.limit, filters.offset);
        let unread_only = filters.unread_only;

        with_conn(&self.db, move |conn| {
            let mut query = notifications::table
                .filter(notifications::user_id.eq(user_id))
                .into_boxed();
            if unread_only {
                query = query.filter(notifications::read.eq(false));
            }

            Ok(query
                .order(notifications::created_at.desc())
                .limit(limit)
                .offset(offset)
                .load(conn)?)
        })
        .await
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<i64, ApiError> {
        with_conn(&self.db, move |conn| {
            Ok(notifications::table
                .filter(notifications::user_id.eq(user_id))
                .filter(notifications::read.eq(false))
                .count()
                .get_result(conn)?)
        })
        .await
    }

    /// Only the owner can mark a notification; anything else looks like a missing row.
    pub async fn mark_read(&self, user_id: Uuid, id: Uuid) -> Result<Notification, ApiError> {
        with_conn(&self.db, move |conn| {
            let existing: Notification = notifications::table
                .filter(notifications::id.eq(id))
                .filter(notifications::user_id.eq(user_id))
                .first(conn)
                .optional()?
                .ok_or_else(|| ApiError::not_found("Notification"))?;
            if existing.read {
                return Ok(existing);
            }

            Ok(diesel::update(notifications::table.find(existing.id))
                .set((
                    notifications::read.eq(true),
                    notifications::read_at.eq(Some(Utc::now())),
                ))
                .get_result(conn)?)
        })
        .await
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<usize, ApiError> {
        with_conn(&self.db, move |conn| {
            Ok(diesel::update(
                notifications::table
                    .filter(notifications::user_id.eq(user_id))
                    .filter(notifications::read.eq(false)),
            )
            .set((
                notifications::read.eq(true),
                notifications::read_at.eq(Some(Utc::now())),
            ))
            .execute(conn)?)
        })
        .await
    }

    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), ApiError> {
        let deleted = with_conn(&self.db, move |conn| {
            Ok(diesel::delete(
                notifications::table
                    .filter(notifications::id.eq(id))
                    .filter(notifications::user_id.eq(user_id)),
            )
            .execute(conn)?)
        })
        .await?;

        if deleted == 0 {
            return Err(ApiError::not_found("Notification"));
        }
        Ok(())
    }

    /// Sends a system notification to every active user, or to one role.
    pub async fn broadcast(
        &self,
        sender: Uuid,
        role: Option<UserRole>,
        title: &str,
        message: &str,
        link: Option<String>,
    ) -> Result<usize, ApiError> {
        if title.trim().is_empty() || message.trim().is_empty() {
            return Err(ApiError::Validation(
                "Title and message are required".to_string(),
            ));
        }

        let mut draft = NotificationDraft::new(NotificationType::System, title.trim(), message.trim());
        if let Some(link) = link {
            draft = draft.with_link(link);
        }

        let sent = with_conn(&self.db, move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| match role {
                Some(role) => Ok(notify_role(conn, role, &draft)?),
                None => {
                    let recipients: Vec<Uuid> = users::table
                        .filter(users::status.eq(UserStatus::Active.as_str()))
                        .select(users::id)
                        .load(conn)?;
                    Ok(notify_many(conn, &recipients, &draft)?)
                }
            })
        })
        .await?;

        info!(
            "Broadcast from {} to {} sent {} notifications",
            sender,
            role.map(|r| r.as_str()).unwrap_or("everyone"),
            sent
        );
        Ok(sent)
    }
}
