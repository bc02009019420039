pub mod handlers;
pub mod storage;
pub mod types;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::core::shared::error::ApiError;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{with_conn, DbPool};
use crate::core::urls::ApiUrls;
use crate::learn::types::EnrollmentStatus;
use crate::learn::EnrollmentEngine;
use crate::notifications::NotificationEngine;
use crate::security::auth_api::{AuthenticatedUser, Permission, Role};

pub use handlers::*;
pub use types::*;

pub struct DashboardEngine {
    db: DbPool,
}

impl DashboardEngine {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Runs a blocking aggregate query off the async runtime.
    async fn blocking<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&mut diesel::PgConnection) -> diesel::QueryResult<T> + Send + 'static,
    {
        with_conn(&self.db, move |conn| Ok(f(conn)?)).await
    }

    pub async fn admin(&self, user: &AuthenticatedUser) -> Result<AdminDashboard, ApiError> {
        user.require(&Permission::ViewPlatformStats)?;
        self.blocking(storage::load_admin_dashboard).await
    }

    pub async fn formateur(&self, user: &AuthenticatedUser) -> Result<FormateurDashboard, ApiError> {
        user.require(&Permission::ManageOwnCourses)?;
        let instructor_id = user.user_id;
        self.blocking(move |conn| storage::load_formateur_dashboard(conn, instructor_id))
            .await
    }

    pub async fn student(&self, user: &AuthenticatedUser) -> Result<StudentDashboard, ApiError> {
        user.require(&Permission::TrackProgress)?;
        let user_id = user.user_id;

        let enrolled_courses = self
            .blocking(move |conn| storage::load_enrolled_courses(conn, user_id))
            .await?;
        let recent_attempts = self
            .blocking(move |conn| storage::load_recent_attempts(conn, user_id))
            .await?;

        let requests = EnrollmentEngine::new(self.db.clone()).list_mine(user).await?;
        let (pending_requests, denied_requests) = requests
            .into_iter()
            .filter(|r| r.request.status != EnrollmentStatus::Approved.as_str())
            .partition(|r| r.request.status == EnrollmentStatus::Pending.as_str());

        let unread_notifications = NotificationEngine::new(self.db.clone())
            .unread_count(user_id)
            .await?;

        Ok(StudentDashboard {
            enrolled_courses,
            pending_requests,
            denied_requests,
            recent_attempts,
            unread_notifications,
        })
    }

    pub async fn for_user(&self, user: &AuthenticatedUser) -> Result<RoleDashboard, ApiError> {
        user.require_authenticated()?;
        match user.role {
            Role::Admin => Ok(RoleDashboard::Admin(self.admin(user).await?)),
            Role::Formateur => Ok(RoleDashboard::Formateur(self.formateur(user).await?)),
            _ => Ok(RoleDashboard::Student(self.student(user).await?)),
        }
    }
}

pub fn configure_dashboards_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::DASHBOARD, get(handle_role_dashboard))
        .route(ApiUrls::DASHBOARD_ADMIN, get(handle_admin_dashboard))
        .route(ApiUrls::DASHBOARD_FORMATEUR, get(handle_formateur_dashboard))
        .route(ApiUrls::DASHBOARD_STUDENT, get(handle_student_dashboard))
}
