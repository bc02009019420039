use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel::PgConnection;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::courses::{ensure_can_manage, load_course};
use super::types::{CourseModule, Progress, ProgressDetail, StudentProgress};
use crate::core::shared::error::ApiError;
use crate::core::shared::schema::{learn_courses, learn_progress, users};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{ok_json, with_conn, DbPool};
use crate::core::urls::ApiUrls;
use crate::notifications::{notify, NotificationDraft, NotificationType};
use crate::security::auth_api::{AuthenticatedUser, Permission};

/// `round(completed / total * 100)`, 0 for a course without lessons.
pub fn compute_progress(completed: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }
    let pct = (completed as f64 / total as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as i32
}

/// Completed lessons that still exist in the course.
pub fn count_completed(completed: &[Uuid], lesson_ids: &[Uuid]) -> usize {
    completed.iter().filter(|id| lesson_ids.contains(id)).count()
}

fn total_lessons(modules: &serde_json::Value) -> usize {
    serde_json::from_value::<Vec<CourseModule>>(modules.clone())
        .map(|modules| modules.iter().map(|m| m.lessons.len()).sum())
        .unwrap_or(0)
}

fn load_progress(
    conn: &mut PgConnection,
    user_id: Uuid,
    course_id: Uuid,
) -> Result<Option<Progress>, ApiError> {
    Ok(learn_progress::table
        .filter(learn_progress::user_id.eq(user_id))
        .filter(learn_progress::course_id.eq(course_id))
        .first(conn)
        .optional()?)
}

fn lock_progress(
    conn: &mut PgConnection,
    user_id: Uuid,
    course_id: Uuid,
) -> Result<Option<Progress>, ApiError> {
    Ok(learn_progress::table
        .filter(learn_progress::user_id.eq(user_id))
        .filter(learn_progress::course_id.eq(course_id))
        .for_update()
        .first(conn)
        .optional()?)
}

fn not_enrolled() -> ApiError {
    ApiError::Forbidden("You are not enrolled in this course".to_string())
}

// ============================================================================
// PROGRESS ENGINE
// ============================================================================

pub struct ProgressEngine {
    db: DbPool,
}

impl ProgressEngine {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn get_progress(
        &self,
        user: &AuthenticatedUser,
        course_id: Uuid,
    ) -> Result<ProgressDetail, ApiError> {
        user.require(&Permission::TrackProgress)?;
        let user_id = user.user_id;

        with_conn(&self.db, move |conn| {
            let course = load_course(conn, course_id)?;
            let progress = load_progress(conn, user_id, course_id)?
                .ok_or_else(|| ApiError::not_found("Progress"))?;

            Ok(ProgressDetail {
                progress,
                total_lessons: total_lessons(&course.modules),
                course_title: course.title,
            })
        })
        .await
    }

    pub async fn list_progress(&self, user: &AuthenticatedUser) -> Result<Vec<ProgressDetail>, ApiError> {
        user.require(&Permission::TrackProgress)?;
        let user_id = user.user_id;

        with_conn(&self.db, move |conn| {
            let rows = learn_progress::table
                .inner_join(learn_courses::table)
                .filter(learn_progress::user_id.eq(user_id))
                .order(learn_progress::last_accessed_at.desc())
                .select((
                    Progress::as_select(),
                    learn_courses::title,
                    learn_courses::modules,
                ))
                .load::<(Progress, String, serde_json::Value)>(conn)?;

            Ok(rows
                .into_iter()
                .map(|(progress, course_title, modules)| ProgressDetail {
                    progress,
                    course_title,
                    total_lessons: total_lessons(&modules),
                })
                .collect())
        })
        .await
    }

    /// Marks a lesson done and recomputes the percentage. Repeating it changes nothing.
    ///
    /// The progress row is locked for the read-modify-write, so concurrent completions
    /// of different lessons all land. The completion notice goes out the first time the
    /// course reaches 100 %.
    pub async fn complete_lesson(
        &self,
        user: &AuthenticatedUser,
        course_id: Uuid,
        lesson_id: Uuid,
    ) -> Result<Progress, ApiError> {
        user.require(&Permission::TrackProgress)?;
        let user_id = user.user_id;

        let updated = with_conn(&self.db, move |conn| {
            let course = load_course(conn, course_id)?;
            let lesson_ids = course.lesson_ids()?;
            if !lesson_ids.contains(&lesson_id) {
                return Err(ApiError::not_found("Lesson"));
            }

            conn.transaction::<_, ApiError, _>(|conn| {
                let progress = lock_progress(conn, user_id, course_id)?.ok_or_else(not_enrolled)?;

                let mut completed = progress.lesson_list();
                if completed.contains(&lesson_id) {
                    return Ok(progress);
                }
                completed.push(lesson_id);

                let pct = compute_progress(count_completed(&completed, &lesson_ids), lesson_ids.len());
                let finished = pct == 100;
                let first_finish = finished && progress.completed_at.is_none();
                let now = Utc::now();

                let updated: Progress = diesel::update(learn_progress::table.find(progress.id))
                    .set((
                        learn_progress::completed_lessons.eq(serde_json::to_value(&completed)?),
                        learn_progress::progress.eq(pct),
                        learn_progress::completed.eq(finished),
                        learn_progress::completed_at.eq(progress.completed_at.or(finished.then_some(now))),
                        learn_progress::last_accessed_at.eq(now),
                    ))
                    .get_result(conn)?;

                if first_finish {
                    let draft = NotificationDraft::new(
                        NotificationType::Course,
                        "Course completed",
                        format!("Congratulations, you finished \"{}\"", course.title),
                    )
                    .with_link(ApiUrls::course(course_id));
                    notify(conn, user_id, &draft)?;
                }
                Ok(updated)
            })
        })
        .await?;

        info!(
            "User {} completed lesson {} of course {} ({}%)",
            user_id, lesson_id, course_id, updated.progress
        );
        Ok(updated)
    }

    /// Removes a lesson from the completed set. A finished course becomes unfinished again;
    /// `completed_at` keeps the date it was first finished.
    pub async fn uncomplete_lesson(
        &self,
        user: &AuthenticatedUser,
        course_id: Uuid,
        lesson_id: Uuid,
    ) -> Result<Progress, ApiError> {
        user.require(&Permission::TrackProgress)?;
        let user_id = user.user_id;

        let updated = with_conn(&self.db, move |conn| {
            let course = load_course(conn, course_id)?;
            let lesson_ids = course.lesson_ids()?;

            conn.transaction::<_, ApiError, _>(|conn| {
                let progress = lock_progress(conn, user_id, course_id)?.ok_or_else(not_enrolled)?;

                let mut completed = progress.lesson_list();
                let before = completed.len();
                completed.retain(|id| *id != lesson_id);
                if completed.len() == before {
                    return Ok(progress);
                }

                let pct = compute_progress(count_completed(&completed, &lesson_ids), lesson_ids.len());
                Ok(diesel::update(learn_progress::table.find(progress.id))
                    .set((
                        learn_progress::completed_lessons.eq(serde_json::to_value(&completed)?),
                        learn_progress::progress.eq(pct),
                        learn_progress::completed.eq(pct == 100),
                        learn_progress::last_accessed_at.eq(Utc::now()),
                    ))
                    .get_result(conn)?)
            })
        })
        .await?;

        info!(
            "User {} reopened lesson {} of course {} ({}%)",
            user_id, lesson_id, course_id, updated.progress
        );
        Ok(updated)
    }

    /// Every enrolled student's progress, for the course's instructor or an admin.
    pub async fn course_progress(
        &self,
        user: &AuthenticatedUser,
        course_id: Uuid,
    ) -> Result<Vec<StudentProgress>, ApiError> {
        let user = user.clone();

        with_conn(&self.db, move |conn| {
            let course = load_course(conn, course_id)?;
            ensure_can_manage(&user, &course)?;

            let rows = learn_progress::table
                .inner_join(users::table.on(users::id.eq(learn_progress::user_id)))
                .filter(learn_progress::course_id.eq(course_id))
                .order(users::display_name.asc())
                .select((Progress::as_select(), users::display_name, users::email))
                .load::<(Progress, String, String)>(conn)?;

            Ok(rows
                .into_iter()
                .map(|(progress, student_name, student_email)| StudentProgress {
                    progress,
                    student_name,
                    student_email,
                })
                .collect())
        })
        .await
    }
}

// ============================================================================
// HTTP HANDLERS
// ============================================================================

pub async fn list_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = ProgressEngine::new(state.conn.clone());
    Ok(ok_json(engine.list_progress(&user).await?))
}

pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = ProgressEngine::new(state.conn.clone());
    Ok(ok_json(engine.get_progress(&user, course_id).await?))
}

pub async fn complete_lesson(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((course_id, lesson_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = ProgressEngine::new(state.conn.clone());
    Ok(ok_json(
        engine.complete_lesson(&user, course_id, lesson_id).await?,
    ))
}

pub async fn uncomplete_lesson(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((course_id, lesson_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = ProgressEngine::new(state.conn.clone());
    Ok(ok_json(
        engine.uncomplete_lesson(&user, course_id, lesson_id).await?,
    ))
}

pub async fn course_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = ProgressEngine::new(state.conn.clone());
    Ok(ok_json(engine.course_progress(&user, course_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_progress() {
        assert_eq!(compute_progress(0, 0), 0);
        assert_eq!(compute_progress(3, 0), 0);
        assert_eq!(compute_progress(0, 4), 0);
        assert_eq!(compute_progress(1, 3), 33);
        assert_eq!(compute_progress(2, 3), 67);
        assert_eq!(compute_progress(3, 3), 100);
        assert_eq!(compute_progress(5, 3), 100);
    }

    #[test]
    fn test_count_completed_ignores_removed_lessons() {
        let kept = Uuid::new_v4();
        let removed = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert_eq!(count_completed(&[kept, removed], &[kept, other]), 1);
        assert_eq!(count_completed(&[], &[kept]), 0);
    }

    #[test]
    fn test_total_lessons_from_modules() {
        let modules = serde_json::json!([
            {"id": Uuid::new_v4(), "title": "One", "lessons": [
                {"id": Uuid::new_v4(), "title": "a"},
                {"id": Uuid::new_v4(), "title": "b"}
            ]},
            {"id": Uuid::new_v4(), "title": "Two"}
        ]);
        assert_eq!(total_lessons(&modules), 2);
        assert_eq!(total_lessons(&serde_json::json!("broken")), 0);
    }

    #[test]
    fn test_new_progress_is_empty() {
        let p = Progress::new(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(p.progress, 0);
        assert!(!p.completed);
        assert!(p.lesson_list().is_empty());
        assert!(p.completed_at.is_none());
    }
}
