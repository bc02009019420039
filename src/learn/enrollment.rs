use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel::PgConnection;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::courses::{ensure_can_manage, load_course};
use super::types::{
    Course, CreateEnrollmentRequest, EnrollmentRequest, EnrollmentRequestDetail,
    EnrollmentStatus, Progress, RespondEnrollmentRequest,
};
use crate::core::shared::error::ApiError;
use crate::core::shared::schema::{
    learn_courses, learn_enrollment_requests, learn_progress, users,
};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{created_json, message_json, ok_json, with_conn, DbPool};
use crate::core::urls::ApiUrls;
use crate::directory::{UserRole, UserStatus};
use crate::notifications::{notify, notify_many, NotificationDraft, NotificationType};
use crate::security::auth_api::{AuthenticatedUser, Permission};

pub const MAX_MESSAGE_LENGTH: usize = 1000;

fn clean_message(message: Option<String>) -> Result<Option<String>, ApiError> {
    let message = message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());
    if let Some(m) = &message {
        if m.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ApiError::Validation(format!(
                "Message must be at most {} characters",
                MAX_MESSAGE_LENGTH
            )));
        }
    }
    Ok(message)
}

fn load_request(conn: &mut PgConnection, request_id: Uuid) -> Result<EnrollmentRequest, ApiError> {
    learn_enrollment_requests::table
        .find(request_id)
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Enrollment request"))
}

pub(crate) fn is_enrolled(
    conn: &mut PgConnection,
    user_id: Uuid,
    course_id: Uuid,
) -> QueryResult<bool> {
    diesel::select(diesel::dsl::exists(
        learn_progress::table
            .filter(learn_progress::user_id.eq(user_id))
            .filter(learn_progress::course_id.eq(course_id)),
    ))
    .get_result(conn)
}

/// Text sent to the student once a reviewer decided.
pub fn decision_notification(
    course: &Course,
    approve: bool,
    response_message: Option<&str>,
) -> NotificationDraft {
    let (title, verdict) = if approve {
        ("Enrollment approved", "approved")
    } else {
        ("Enrollment denied", "denied")
    };
    let mut message = format!(
        "Your request to join \"{}\" was {}.",
        course.title, verdict
    );
    if let Some(note) = response_message {
        message.push(' ');
        message.push_str(note);
    }

    NotificationDraft::new(NotificationType::Enrollment, title, message)
        .with_link(ApiUrls::course(course.id))
}

// ============================================================================
// ENROLLMENT ENGINE
// ============================================================================

pub struct EnrollmentEngine {
    db: DbPool,
}

impl EnrollmentEngine {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn request_enrollment(
        &self,
        user: &AuthenticatedUser,
        req: CreateEnrollmentRequest,
    ) -> Result<EnrollmentRequest, ApiError> {
        user.require(&Permission::RequestEnrollment)?;
        let message = clean_message(req.message)?;
        let course_id = req.course_id;
        let student_id = user.user_id;
        let display_name = user.display_name.clone();

        let request = with_conn(&self.db, move |conn| {
            let course = load_course(conn, course_id)?;
            if !course.is_published() {
                return Err(ApiError::not_found("Course"));
            }
            if is_enrolled(conn, student_id, course.id)? {
                return Err(ApiError::Conflict(
                    "You are already enrolled in this course".to_string(),
                ));
            }

            let pending: bool = diesel::select(diesel::dsl::exists(
                learn_enrollment_requests::table
                    .filter(learn_enrollment_requests::student_id.eq(student_id))
                    .filter(learn_enrollment_requests::course_id.eq(course.id))
                    .filter(learn_enrollment_requests::status.eq(EnrollmentStatus::Pending.as_str())),
            ))
            .get_result(conn)?;
            if pending {
                return Err(ApiError::Conflict(
                    "A request for this course is already pending".to_string(),
                ));
            }

            let now = Utc::now();
            let request = EnrollmentRequest {
                id: Uuid::new_v4(),
                student_id,
                course_id: course.id,
                status: EnrollmentStatus::Pending.as_str().to_string(),
                message,
                response_message: None,
                responded_by: None,
                responded_at: None,
                created_at: now,
                updated_at: now,
            };

            let draft = NotificationDraft::new(
                NotificationType::Enrollment,
                "New enrollment request",
                format!("{} asked to join \"{}\"", display_name, course.title),
            )
            .with_link(ApiUrls::enrollment(request.id));

            conn.transaction::<_, ApiError, _>(|conn| {
                diesel::insert_into(learn_enrollment_requests::table)
                    .values(&request)
                    .execute(conn)
                    .map_err(|e| match ApiError::from(e) {
                        ApiError::Conflict(_) => ApiError::Conflict(
                            "A request for this course is already pending".to_string(),
                        ),
                        other => other,
                    })?;

                let mut reviewers: Vec<Uuid> = users::table
                    .filter(users::role.eq(UserRole::Admin.as_str()))
                    .filter(users::status.eq(UserStatus::Active.as_str()))
                    .select(users::id)
                    .load(conn)?;
                reviewers.push(course.instructor_id);
                notify_many(conn, &reviewers, &draft)?;
                Ok(())
            })?;
            Ok(request)
        })
        .await?;

        info!(
            "Student {} requested enrollment {} in course {}",
            user.user_id, request.id, request.course_id
        );
        Ok(request)
    }

    /// Decides a pending request.
    ///
    /// The request row is locked for the decision, so of two concurrent decisions only
    /// one succeeds. Approval creates the progress record and bumps the course's student
    /// count only when the record did not exist yet.
    pub async fn respond(
        &self,
        user: &AuthenticatedUser,
        request_id: Uuid,
        req: RespondEnrollmentRequest,
    ) -> Result<EnrollmentRequest, ApiError> {
        user.require(&Permission::ReviewEnrollments)?;
        let response_message = clean_message(req.response_message)?;
        let approve = req.approve;
        let decision = if approve {
            EnrollmentStatus::Approved
        } else {
            EnrollmentStatus::Denied
        };
        let actor = user.clone();

        let updated = with_conn(&self.db, move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                let request: EnrollmentRequest = learn_enrollment_requests::table
                    .find(request_id)
                    .for_update()
                    .first(conn)
                    .optional()?
                    .ok_or_else(|| ApiError::not_found("Enrollment request"))?;
                let course = load_course(conn, request.course_id)?;
                ensure_can_manage(&actor, &course)?;

                if !request.is_pending() {
                    return Err(ApiError::Conflict(format!(
                        "Request was already {}",
                        request.status
                    )));
                }

                let now = Utc::now();
                let updated: EnrollmentRequest =
                    diesel::update(learn_enrollment_requests::table.find(request_id))
                        .set((
                            learn_enrollment_requests::status.eq(decision.as_str()),
                            learn_enrollment_requests::response_message.eq(response_message.clone()),
                            learn_enrollment_requests::responded_by.eq(Some(actor.user_id)),
                            learn_enrollment_requests::responded_at.eq(Some(now)),
                            learn_enrollment_requests::updated_at.eq(now),
                        ))
                        .get_result(conn)?;

                if approve {
                    let inserted = diesel::insert_into(learn_progress::table)
                        .values(Progress::new(request.student_id, request.course_id))
                        .on_conflict((learn_progress::user_id, learn_progress::course_id))
                        .do_nothing()
                        .execute(conn)?;

                    if inserted > 0 {
                        diesel::update(learn_courses::table.find(request.course_id))
                            .set(learn_courses::student_count.eq(learn_courses::student_count + 1))
                            .execute(conn)?;
                    } else {
                        warn!(
                            "Student {} already had progress for course {}",
                            request.student_id, request.course_id
                        );
                    }
                }

                let draft = decision_notification(&course, approve, response_message.as_deref());
                notify(conn, request.student_id, &draft)?;
                Ok(updated)
            })
        })
        .await?;

        info!(
            "User {} {} enrollment request {}",
            user.user_id, decision, request_id
        );
        Ok(updated)
    }

    /// Students withdraw their own pending requests.
    pub async fn cancel(&self, user: &AuthenticatedUser, request_id: Uuid) -> Result<(), ApiError> {
        user.require(&Permission::RequestEnrollment)?;
        let student_id = user.user_id;

        with_conn(&self.db, move |conn| {
            let request = load_request(conn, request_id)?;
            if request.student_id != student_id {
                return Err(ApiError::not_found("Enrollment request"));
            }

            let deleted = diesel::delete(
                learn_enrollment_requests::table
                    .find(request_id)
                    .filter(learn_enrollment_requests::status.eq(EnrollmentStatus::Pending.as_str())),
            )
            .execute(conn)?;
            if deleted == 0 {
                return Err(ApiError::Conflict(
                    "Only pending requests can be cancelled".to_string(),
                ));
            }
            Ok(())
        })
        .await?;

        info!("Student {} cancelled enrollment request {}", user.user_id, request_id);
        Ok(())
    }

    pub async fn get(
        &self,
        user: &AuthenticatedUser,
        request_id: Uuid,
    ) -> Result<EnrollmentRequest, ApiError> {
        user.require_authenticated()?;
        let actor = user.clone();

        with_conn(&self.db, move |conn| {
            let request = load_request(conn, request_id)?;
            if request.student_id == actor.user_id {
                return Ok(request);
            }

            let course = load_course(conn, request.course_id)?;
            if actor.can_manage(&course.instructor_id) {
                Ok(request)
            } else {
                Err(ApiError::not_found("Enrollment request"))
            }
        })
        .await
    }

    pub async fn list_mine(&self, user: &AuthenticatedUser) -> Result<Vec<EnrollmentRequestDetail>, ApiError> {
        user.require(&Permission::RequestEnrollment)?;
        let student_id = user.user_id;

        with_conn(&self.db, move |conn| {
            let rows = learn_enrollment_requests::table
                .inner_join(learn_courses::table)
                .inner_join(users::table.on(users::id.eq(learn_enrollment_requests::student_id)))
                .filter(learn_enrollment_requests::student_id.eq(student_id))
                .order(learn_enrollment_requests::created_at.desc())
                .select((
                    EnrollmentRequest::as_select(),
                    learn_courses::title,
                    users::display_name,
                    users::email,
                ))
                .load::<(EnrollmentRequest, String, String, String)>(conn)?;

            Ok(rows.into_iter().map(into_detail).collect())
        })
        .await
    }

    /// Admins see every pending request; formateurs those on their own courses.
    pub async fn list_pending(&self, user: &AuthenticatedUser) -> Result<Vec<EnrollmentRequestDetail>, ApiError> {
        user.require(&Permission::ReviewEnrollments)?;
        let instructor = (!user.is_admin()).then_some(user.user_id);

        with_conn(&self.db, move |conn| {
            let mut query = learn_enrollment_requests::table
                .inner_join(learn_courses::table)
                .inner_join(users::table.on(users::id.eq(learn_enrollment_requests::student_id)))
                .filter(learn_enrollment_requests::status.eq(EnrollmentStatus::Pending.as_str()))
                .into_boxed();
            if let Some(instructor_id) = instructor {
                query = query.filter(learn_courses::instructor_id.eq(instructor_id));
            }

            let rows = query
                .order(learn_enrollment_requests::created_at.asc())
                .select((
                    EnrollmentRequest::as_select(),
                    learn_courses::title,
                    users::display_name,
                    users::email,
                ))
                .load::<(EnrollmentRequest, String, String, String)>(conn)?;

            Ok(rows.into_iter().map(into_detail).collect())
        })
        .await
    }

    pub async fn list_for_course(
        &self,
        user: &AuthenticatedUser,
        course_id: Uuid,
    ) -> Result<Vec<EnrollmentRequestDetail>, ApiError> {
        let actor = user.clone();

        with_conn(&self.db, move |conn| {
            let course = load_course(conn, course_id)?;
            ensure_can_manage(&actor, &course)?;

            let rows = learn_enrollment_requests::table
                .inner_join(learn_courses::table)
                .inner_join(users::table.on(users::id.eq(learn_enrollment_requests::student_id)))
                .filter(learn_enrollment_requests::course_id.eq(course_id))
                .order(learn_enrollment_requests::created_at.desc())
                .select((
                    EnrollmentRequest::as_select(),
                    learn_courses::title,
                    users::display_name,
                    users::email,
                ))
                .load::<(EnrollmentRequest, String, String, String)>(conn)?;

            Ok(rows.into_iter().map(into_detail).collect())
        })
        .await
    }
}

fn into_detail(row: (EnrollmentRequest, String, String, String)) -> EnrollmentRequestDetail {
    let (request, course_title, student_name, student_email) = row;
    EnrollmentRequestDetail {
        request,
        course_title,
        student_name,
        student_email,
    }
}

// ============================================================================
// HTTP HANDLERS
// ============================================================================

pub async fn request_enrollment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(req): Json<CreateEnrollmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = EnrollmentEngine::new(state.conn.clone());
    Ok(created_json(engine.request_enrollment(&user, req).await?))
}

pub async fn list_my_requests(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = EnrollmentEngine::new(state.conn.clone());
    Ok(ok_json(engine.list_mine(&user).await?))
}

pub async fn list_pending_requests(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = EnrollmentEngine::new(state.conn.clone());
    Ok(ok_json(engine.list_pending(&user).await?))
}

pub async fn list_course_requests(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = EnrollmentEngine::new(state.conn.clone());
    Ok(ok_json(engine.list_for_course(&user, course_id).await?))
}

pub async fn get_request(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = EnrollmentEngine::new(state.conn.clone());
    Ok(ok_json(engine.get(&user, request_id).await?))
}

pub async fn respond_to_request(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(request_id): Path<Uuid>,
    Json(req): Json<RespondEnrollmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = EnrollmentEngine::new(state.conn.clone());
    Ok(ok_json(engine.respond(&user, request_id, req).await?))
}

pub async fn cancel_request(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = EnrollmentEngine::new(state.conn.clone());
    engine.cancel(&user, request_id).await?;
    Ok(message_json("Enrollment request cancelled"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learn::types::CourseStatus;

    fn course(title: &str) -> Course {
        let now = Utc::now();
        Course {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: String::new(),
            category: "general".to_string(),
            instructor_id: Uuid::new_v4(),
            status: CourseStatus::Published.as_str().to_string(),
            modules: serde_json::json!([]),
            student_count: 0,
            image_url: None,
            rejection_reason: None,
            published_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_decision_notification_approved() {
        let c = course("Rust 101");
        let row = decision_notification(&c, true, Some("See you Monday."))
            .addressed_to(Uuid::new_v4());

        assert_eq!(row.title, "Enrollment approved");
        assert_eq!(
            row.message,
            "Your request to join \"Rust 101\" was approved. See you Monday."
        );
        assert_eq!(row.notification_type, "enrollment");
        assert_eq!(row.link, Some(ApiUrls::course(c.id)));
    }

    #[test]
    fn test_decision_notification_denied_without_note() {
        let c = course("Async Rust");
        let row = decision_notification(&c, false, None).addressed_to(Uuid::new_v4());
        assert_eq!(row.title, "Enrollment denied");
        assert_eq!(row.message, "Your request to join \"Async Rust\" was denied.");
    }

    #[test]
    fn test_clean_message() {
        assert_eq!(clean_message(None).unwrap(), None);
        assert_eq!(clean_message(Some("   ".to_string())).unwrap(), None);
        assert_eq!(
            clean_message(Some(" please ".to_string())).unwrap().as_deref(),
            Some("please")
        );
        assert!(clean_message(Some("x".repeat(MAX_MESSAGE_LENGTH + 1))).is_err());
    }

    #[test]
    fn test_enrollment_status_roundtrip() {
        for status in [
            EnrollmentStatus::Pending,
            EnrollmentStatus::Approved,
            EnrollmentStatus::Denied,
        ] {
            assert_eq!(EnrollmentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(EnrollmentStatus::parse("cancelled"), None);
    }

    #[test]
    fn test_respond_payload() {
        let req: RespondEnrollmentRequest =
            serde_json::from_str(r#"{"approve":false,"response_message":"Course is full"}"#)
                .unwrap();
        assert!(!req.approve);
        assert_eq!(req.response_message.as_deref(), Some("Course is full"));
    }
}
