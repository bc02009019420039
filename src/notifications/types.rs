use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::shared::schema::notifications;
use crate::directory::UserRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Enrollment,
    Course,
    Quiz,
    Account,
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enrollment => "enrollment",
            Self::Course => "course",
            Self::Quiz => "quiz",
            Self::Account => "account",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = notifications)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub link: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub link: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Content of a notification before it is addressed to anyone.
#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

impl NotificationDraft {
    pub fn new(kind: NotificationType, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn addressed_to(&self, user_id: Uuid) -> NewNotification {
        NewNotification {
            id: Uuid::new_v4(),
            user_id,
            title: self.title.clone(),
            message: self.message.clone(),
            notification_type: self.kind.as_str().to_string(),
            link: self.link.clone(),
            read: false,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationFilters {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastRequest {
    pub role: Option<UserRole>,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}
