use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel::PgConnection;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::types::{
    Course, CourseFilters, CourseModule, CourseStatus, CreateCourseRequest, LessonInput,
    ModuleInput, ReviewCourseRequest, UpdateCourseRequest,
};
use crate::core::shared::error::ApiError;
use crate::core::shared::schema::{
    learn_courses, learn_enrollment_requests, learn_progress, learn_quiz_attempts, learn_quizzes,
};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{
    created_json, like_pattern, message_json, ok_json, page, with_conn, DbPool,
};
use crate::core::urls::ApiUrls;
use crate::directory::UserRole;
use crate::notifications::{notify, notify_role, NotificationDraft, NotificationType};
use crate::security::auth_api::{AuthenticatedUser, Permission};

pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_DESCRIPTION_LENGTH: usize = 10_000;
pub const DEFAULT_CATEGORY: &str = "general";

// ============================================================================
// HELPERS
// ============================================================================

pub(crate) fn load_course(conn: &mut PgConnection, course_id: Uuid) -> Result<Course, ApiError> {
    learn_courses::table
        .find(course_id)
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Course"))
}

/// Loads the course row with `FOR UPDATE`; call inside a transaction.
fn lock_course(conn: &mut PgConnection, course_id: Uuid) -> Result<Course, ApiError> {
    learn_courses::table
        .find(course_id)
        .for_update()
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Course"))
}

/// Owner formateur or any admin.
pub(crate) fn ensure_can_manage(user: &AuthenticatedUser, course: &Course) -> Result<(), ApiError> {
    user.require_authenticated()?;
    if user.can_manage(&course.instructor_id) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "Only the course instructor or an admin can do this".to_string(),
        ))
    }
}

/// Drafts, pending and rejected courses are invisible to everyone but their managers.
pub(crate) fn ensure_visible(user: &AuthenticatedUser, course: &Course) -> Result<(), ApiError> {
    if course.is_published() || user.can_manage(&course.instructor_id) {
        Ok(())
    } else {
        Err(ApiError::not_found("Course"))
    }
}

fn ensure_transition(course: &Course, next: CourseStatus) -> Result<(), ApiError> {
    let current = course.course_status();
    if current.can_transition_to(next) {
        Ok(())
    } else {
        Err(ApiError::Conflict(format!(
            "Course cannot move from {} to {}",
            current, next
        )))
    }
}

pub fn validate_title(title: &str) -> Result<String, ApiError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::Validation("Title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ApiError::Validation(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(title.to_string())
}

fn validate_description(description: &str) -> Result<String, ApiError> {
    let description = description.trim();
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(ApiError::Validation(format!(
            "Description must be at most {} characters",
            MAX_DESCRIPTION_LENGTH
        )));
    }
    Ok(description.to_string())
}

fn normalize_category(category: Option<&str>) -> String {
    category
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string())
}

/// Builds modules from client input, generating missing ids and rejecting blank titles
/// and repeated module or lesson ids.
pub fn build_modules(inputs: Vec<ModuleInput>) -> Result<Vec<CourseModule>, ApiError> {
    let modules: Vec<CourseModule> = inputs.into_iter().map(ModuleInput::into_module).collect();
    let mut module_ids = HashSet::new();
    let mut lesson_ids = HashSet::new();
    for module in &modules {
        if module.title.is_empty() {
            return Err(ApiError::Validation("Module title is required".to_string()));
        }
        if !module_ids.insert(module.id) {
            return Err(ApiError::Conflict("Module id already exists".to_string()));
        }
        for lesson in &module.lessons {
            if lesson.title.is_empty() {
                return Err(ApiError::Validation("Lesson title is required".to_string()));
            }
            if !lesson_ids.insert(lesson.id) {
                return Err(ApiError::Conflict("Lesson id already exists".to_string()));
            }
        }
    }
    Ok(modules)
}

pub fn count_lessons(modules: &[CourseModule]) -> usize {
    modules.iter().map(|m| m.lessons.len()).sum()
}

fn store_modules(
    conn: &mut PgConnection,
    course_id: Uuid,
    modules: &[CourseModule],
) -> Result<Course, ApiError> {
    Ok(diesel::update(learn_courses::table.find(course_id))
        .set((
            learn_courses::modules.eq(serde_json::to_value(modules)?),
            learn_courses::updated_at.eq(Utc::now()),
        ))
        .get_result(conn)?)
}

// ============================================================================
// COURSE ENGINE
// ============================================================================

pub struct CourseEngine {
    db: DbPool,
}

impl CourseEngine {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Locks the course, checks the caller may manage it and rewrites its modules.
    async fn edit_modules<F>(
        &self,
        user: &AuthenticatedUser,
        course_id: Uuid,
        edit: F,
    ) -> Result<Course, ApiError>
    where
        F: FnOnce(&mut Vec<CourseModule>) -> Result<(), ApiError> + Send + 'static,
    {
        let user = user.clone();
        with_conn(&self.db, move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                let course = lock_course(conn, course_id)?;
                ensure_can_manage(&user, &course)?;

                let mut modules = course.module_list()?;
                edit(&mut modules)?;
                store_modules(conn, course_id, &modules)
            })
        })
        .await
    }

    // ----- Queries -----

    pub async fn list_catalog(&self, filters: &CourseFilters) -> Result<Vec<Course>, ApiError> {
        let filters = filters.clone();
        with_conn(&self.db, move |conn| {
            let (limit, offset) = page(filters.limit, filters.offset);

            let mut query = learn_courses::table
                .filter(learn_courses::status.eq(CourseStatus::Published.as_str()))
                .into_boxed();

            if let Some(category) = filters.category.as_deref().filter(|c| !c.trim().is_empty()) {
                query = query.filter(learn_courses::category.eq(category.trim().to_lowercase()));
            }
            if let Some(search) = filters.search.as_deref().filter(|s| !s.trim().is_empty()) {
                let pattern = like_pattern(search);
                query = query.filter(
                    learn_courses::title
                        .ilike(pattern.clone())
                        .or(learn_courses::description.ilike(pattern)),
                );
            }

            Ok(query
                .order(learn_courses::published_at.desc().nulls_last())
                .limit(limit)
                .offset(offset)
                .load(conn)?)
        })
        .await
    }

    pub async fn list_instructor_courses(&self, instructor_id: Uuid) -> Result<Vec<Course>, ApiError> {
        with_conn(&self.db, move |conn| {
            Ok(learn_courses::table
                .filter(learn_courses::instructor_id.eq(instructor_id))
                .order(learn_courses::updated_at.desc())
                .load(conn)?)
        })
        .await
    }

    pub async fn list_all(&self, filters: &CourseFilters) -> Result<Vec<Course>, ApiError> {
        let filters = filters.clone();
        with_conn(&self.db, move |conn| {
            let (limit, offset) = page(filters.limit, filters.offset);

            let mut query = learn_courses::table.into_boxed();
            if let Some(status) = filters.status {
                query = query.filter(learn_courses::status.eq(status.as_str()));
            }
            if let Some(search) = filters.search.as_deref().filter(|s| !s.trim().is_empty()) {
                query = query.filter(learn_courses::title.ilike(like_pattern(search)));
            }

            Ok(query
                .order(learn_courses::updated_at.desc())
                .limit(limit)
                .offset(offset)
                .load(conn)?)
        })
        .await
    }

    pub async fn get_course(&self, user: &AuthenticatedUser, course_id: Uuid) -> Result<Course, ApiError> {
        let course = with_conn(&self.db, move |conn| load_course(conn, course_id)).await?;
        ensure_visible(user, &course)?;
        Ok(course)
    }

    /// Titles of published courses, newest first.
    pub async fn published_titles(&self, limit: i64) -> Result<Vec<String>, ApiError> {
        with_conn(&self.db, move |conn| {
            Ok(learn_courses::table
                .filter(learn_courses::status.eq(CourseStatus::Published.as_str()))
                .order(learn_courses::published_at.desc().nulls_last())
                .select(learn_courses::title)
                .limit(limit)
                .load(conn)?)
        })
        .await
    }

    // ----- Authoring -----

    pub async fn create_course(
        &self,
        user: &AuthenticatedUser,
        req: CreateCourseRequest,
    ) -> Result<Course, ApiError> {
        user.require(&Permission::ManageOwnCourses)?;

        let modules = build_modules(req.modules.unwrap_or_default())?;
        let now = Utc::now();
        let course = Course {
            id: Uuid::new_v4(),
            title: validate_title(&req.title)?,
            description: validate_description(&req.description)?,
            category: normalize_category(req.category.as_deref()),
            instructor_id: user.user_id,
            status: CourseStatus::Draft.as_str().to_string(),
            modules: serde_json::to_value(&modules)?,
            student_count: 0,
            image_url: req.image_url.filter(|u| !u.trim().is_empty()),
            rejection_reason: None,
            published_at: None,
            created_at: now,
            updated_at: now,
        };

        let course = with_conn(&self.db, move |conn| {
            diesel::insert_into(learn_courses::table)
                .values(&course)
                .execute(conn)?;
            Ok(course)
        })
        .await?;

        info!("User {} created course {}", user.user_id, course.id);
        Ok(course)
    }

    /// A rejected course keeps its status until resubmitted, but the old reason goes away.
    pub async fn update_course(
        &self,
        user: &AuthenticatedUser,
        course_id: Uuid,
        req: UpdateCourseRequest,
    ) -> Result<Course, ApiError> {
        let title = req.title.as_deref().map(validate_title).transpose()?;
        let description = req.description.as_deref().map(validate_description).transpose()?;
        let modules = match req.modules {
            Some(inputs) => Some(serde_json::to_value(build_modules(inputs)?)?),
            None => None,
        };
        let category = req.category;
        let image_url = req.image_url;
        let actor = user.clone();

        let updated = with_conn(&self.db, move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                let course = lock_course(conn, course_id)?;
                ensure_can_manage(&actor, &course)?;

                let image_url = match image_url {
                    Some(url) if url.trim().is_empty() => None,
                    Some(url) => Some(url),
                    None => course.image_url.clone(),
                };
                let rejection_reason = if course.course_status() == CourseStatus::Rejected {
                    None
                } else {
                    course.rejection_reason.clone()
                };

                Ok(diesel::update(learn_courses::table.find(course_id))
                    .set((
                        learn_courses::title.eq(title.unwrap_or(course.title)),
                        learn_courses::description.eq(description.unwrap_or(course.description)),
                        learn_courses::category.eq(match category {
                            Some(c) => normalize_category(Some(&c)),
                            None => course.category,
                        }),
                        learn_courses::modules.eq(modules.unwrap_or(course.modules)),
                        learn_courses::image_url.eq(image_url),
                        learn_courses::rejection_reason.eq(rejection_reason),
                        learn_courses::updated_at.eq(Utc::now()),
                    ))
                    .get_result(conn)?)
            })
        })
        .await?;

        info!("User {} updated course {}", user.user_id, course_id);
        Ok(updated)
    }

    pub async fn add_module(
        &self,
        user: &AuthenticatedUser,
        course_id: Uuid,
        input: ModuleInput,
    ) -> Result<Course, ApiError> {
        let mut added = build_modules(vec![input])?;

        let updated = self
            .edit_modules(user, course_id, move |modules| {
                if modules.iter().any(|m| added.iter().any(|a| a.id == m.id)) {
                    return Err(ApiError::Conflict("Module id already exists".to_string()));
                }
                let existing: HashSet<Uuid> =
                    modules.iter().flat_map(|m| &m.lessons).map(|l| l.id).collect();
                if added.iter().flat_map(|m| &m.lessons).any(|l| existing.contains(&l.id)) {
                    return Err(ApiError::Conflict("Lesson id already exists".to_string()));
                }
                modules.append(&mut added);
                Ok(())
            })
            .await?;

        info!("User {} added a module to course {}", user.user_id, course_id);
        Ok(updated)
    }

    pub async fn remove_module(
        &self,
        user: &AuthenticatedUser,
        course_id: Uuid,
        module_id: Uuid,
    ) -> Result<Course, ApiError> {
        let updated = self
            .edit_modules(user, course_id, move |modules| {
                let before = modules.len();
                modules.retain(|m| m.id != module_id);
                if modules.len() == before {
                    return Err(ApiError::not_found("Module"));
                }
                Ok(())
            })
            .await?;

        info!("User {} removed module {} from course {}", user.user_id, module_id, course_id);
        Ok(updated)
    }

    pub async fn add_lesson(
        &self,
        user: &AuthenticatedUser,
        course_id: Uuid,
        module_id: Uuid,
        input: LessonInput,
    ) -> Result<Course, ApiError> {
        let lesson = input.into_lesson();
        if lesson.title.is_empty() {
            return Err(ApiError::Validation("Lesson title is required".to_string()));
        }

        let updated = self
            .edit_modules(user, course_id, move |modules| {
                if modules.iter().flat_map(|m| &m.lessons).any(|l| l.id == lesson.id) {
                    return Err(ApiError::Conflict("Lesson id already exists".to_string()));
                }
                let module = modules
                    .iter_mut()
                    .find(|m| m.id == module_id)
                    .ok_or_else(|| ApiError::not_found("Module"))?;
                module.lessons.push(lesson);
                Ok(())
            })
            .await?;

        info!("User {} added a lesson to course {}", user.user_id, course_id);
        Ok(updated)
    }

    pub async fn remove_lesson(
        &self,
        user: &AuthenticatedUser,
        course_id: Uuid,
        module_id: Uuid,
        lesson_id: Uuid,
    ) -> Result<Course, ApiError> {
        let updated = self
            .edit_modules(user, course_id, move |modules| {
                let module = modules
                    .iter_mut()
                    .find(|m| m.id == module_id)
                    .ok_or_else(|| ApiError::not_found("Module"))?;
                let before = module.lessons.len();
                module.lessons.retain(|l| l.id != lesson_id);
                if module.lessons.len() == before {
                    return Err(ApiError::not_found("Lesson"));
                }
                Ok(())
            })
            .await?;

        info!("User {} removed lesson {} from course {}", user.user_id, lesson_id, course_id);
        Ok(updated)
    }

    pub async fn set_image(
        &self,
        user: &AuthenticatedUser,
        course_id: Uuid,
        image_url: &str,
    ) -> Result<Course, ApiError> {
        let actor = user.clone();
        let image_url = image_url.to_string();

        let updated = with_conn(&self.db, move |conn| {
            let course = load_course(conn, course_id)?;
            ensure_can_manage(&actor, &course)?;

            Ok(diesel::update(learn_courses::table.find(course_id))
                .set((
                    learn_courses::image_url.eq(Some(image_url)),
                    learn_courses::updated_at.eq(Utc::now()),
                ))
                .get_result(conn)?)
        })
        .await?;

        info!("User {} set the image of course {}", user.user_id, course_id);
        Ok(updated)
    }

    // ----- Approval workflow -----

    pub async fn submit_for_approval(
        &self,
        user: &AuthenticatedUser,
        course_id: Uuid,
    ) -> Result<Course, ApiError> {
        let actor = user.clone();

        let updated = with_conn(&self.db, move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                let course = lock_course(conn, course_id)?;
                ensure_can_manage(&actor, &course)?;
                ensure_transition(&course, CourseStatus::PendingApproval)?;

                if count_lessons(&course.module_list()?) == 0 {
                    return Err(ApiError::Validation(
                        "A course needs at least one lesson before it can be submitted".to_string(),
                    ));
                }

                let updated: Course = diesel::update(learn_courses::table.find(course_id))
                    .set((
                        learn_courses::status.eq(CourseStatus::PendingApproval.as_str()),
                        learn_courses::rejection_reason.eq(None::<String>),
                        learn_courses::updated_at.eq(Utc::now()),
                    ))
                    .get_result(conn)?;

                let draft = NotificationDraft::new(
                    NotificationType::Course,
                    "Course awaiting approval",
                    format!("\"{}\" was submitted for review", course.title),
                )
                .with_link(ApiUrls::course(course_id));
                notify_role(conn, UserRole::Admin, &draft)?;
                Ok(updated)
            })
        })
        .await?;

        info!("User {} submitted course {} for approval", user.user_id, course_id);
        Ok(updated)
    }

    pub async fn review_course(
        &self,
        user: &AuthenticatedUser,
        course_id: Uuid,
        req: ReviewCourseRequest,
    ) -> Result<Course, ApiError> {
        user.require(&Permission::ApproveCourses)?;

        let approve = req.approve;
        let next = if approve {
            CourseStatus::Published
        } else {
            CourseStatus::Rejected
        };
        let reason = req
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        if !approve && reason.is_none() {
            return Err(ApiError::Validation(
                "A reason is required when rejecting a course".to_string(),
            ));
        }

        let updated = with_conn(&self.db, move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                let course = lock_course(conn, course_id)?;
                ensure_transition(&course, next)?;

                let now = Utc::now();
                let updated: Course = diesel::update(learn_courses::table.find(course_id))
                    .set((
                        learn_courses::status.eq(next.as_str()),
                        learn_courses::rejection_reason.eq(reason.clone()),
                        learn_courses::published_at.eq(if approve {
                            Some(now)
                        } else {
                            course.published_at
                        }),
                        learn_courses::updated_at.eq(now),
                    ))
                    .get_result(conn)?;

                let draft = if approve {
                    NotificationDraft::new(
                        NotificationType::Course,
                        "Course published",
                        format!("\"{}\" is now live in the catalog", course.title),
                    )
                } else {
                    NotificationDraft::new(
                        NotificationType::Course,
                        "Course rejected",
                        format!(
                            "\"{}\" was not approved: {}",
                            course.title,
                            reason.as_deref().unwrap_or_default()
                        ),
                    )
                }
                .with_link(ApiUrls::course(course_id));
                notify(conn, course.instructor_id, &draft)?;
                Ok(updated)
            })
        })
        .await?;

        info!(
            "Admin {} {} course {}",
            user.user_id,
            if approve { "approved" } else { "rejected" },
            course_id
        );
        Ok(updated)
    }

    pub async fn unpublish(&self, user: &AuthenticatedUser, course_id: Uuid) -> Result<Course, ApiError> {
        let actor = user.clone();

        let updated = with_conn(&self.db, move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                let course = lock_course(conn, course_id)?;
                ensure_can_manage(&actor, &course)?;
                ensure_transition(&course, CourseStatus::Draft)?;

                let updated: Course = diesel::update(learn_courses::table.find(course_id))
                    .set((
                        learn_courses::status.eq(CourseStatus::Draft.as_str()),
                        learn_courses::updated_at.eq(Utc::now()),
                    ))
                    .get_result(conn)?;
                if actor.user_id != course.instructor_id {
                    let draft = NotificationDraft::new(
                        NotificationType::Course,
                        "Course unpublished",
                        format!("\"{}\" was moved back to draft by an admin", course.title),
                    )
                    .with_link(ApiUrls::course(course_id));
                    notify(conn, course.instructor_id, &draft)?;
                }
                Ok(updated)
            })
        })
        .await?;

        info!("User {} unpublished course {}", user.user_id, course_id);
        Ok(updated)
    }

    /// Admins delete anything; instructors only what is not published.
    pub async fn delete_course(&self, user: &AuthenticatedUser, course_id: Uuid) -> Result<(), ApiError> {
        let actor = user.clone();

        with_conn(&self.db, move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                let course = lock_course(conn, course_id)?;
                ensure_can_manage(&actor, &course)?;
                if !actor.is_admin() && course.is_published() {
                    return Err(ApiError::Conflict(
                        "Unpublish the course before deleting it".to_string(),
                    ));
                }

                diesel::delete(
                    learn_quiz_attempts::table.filter(learn_quiz_attempts::course_id.eq(course_id)),
                )
                .execute(conn)?;
                diesel::delete(learn_quizzes::table.filter(learn_quizzes::course_id.eq(course_id)))
                    .execute(conn)?;
                diesel::delete(
                    learn_enrollment_requests::table
                        .filter(learn_enrollment_requests::course_id.eq(course_id)),
                )
                .execute(conn)?;
                diesel::delete(learn_progress::table.filter(learn_progress::course_id.eq(course_id)))
                    .execute(conn)?;
                diesel::delete(learn_courses::table.find(course_id)).execute(conn)?;
                Ok(())
            })
        })
        .await?;

        info!("User {} deleted course {}", user.user_id, course_id);
        Ok(())
    }
}

// ============================================================================
// HTTP HANDLERS
// ============================================================================

pub async fn list_catalog(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<CourseFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = CourseEngine::new(state.conn.clone());
    Ok(ok_json(engine.list_catalog(&filters).await?))
}

pub async fn list_my_courses(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(&Permission::ManageOwnCourses)?;
    let engine = CourseEngine::new(state.conn.clone());
    Ok(ok_json(engine.list_instructor_courses(user.user_id).await?))
}

pub async fn list_all_courses(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(filters): Query<CourseFilters>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(&Permission::ApproveCourses)?;
    let engine = CourseEngine::new(state.conn.clone());
    Ok(ok_json(engine.list_all(&filters).await?))
}

pub async fn create_course(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(req): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = CourseEngine::new(state.conn.clone());
    Ok(created_json(engine.create_course(&user, req).await?))
}

pub async fn get_course(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = CourseEngine::new(state.conn.clone());
    Ok(ok_json(engine.get_course(&user, course_id).await?))
}

pub async fn update_course(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(course_id): Path<Uuid>,
    Json(req): Json<UpdateCourseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = CourseEngine::new(state.conn.clone());
    Ok(ok_json(engine.update_course(&user, course_id, req).await?))
}

pub async fn delete_course(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = CourseEngine::new(state.conn.clone());
    engine.delete_course(&user, course_id).await?;
    Ok(message_json("Course deleted"))
}

pub async fn add_module(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(course_id): Path<Uuid>,
    Json(req): Json<ModuleInput>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = CourseEngine::new(state.conn.clone());
    Ok(created_json(engine.add_module(&user, course_id, req).await?))
}

pub async fn remove_module(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((course_id, module_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = CourseEngine::new(state.conn.clone());
    Ok(ok_json(engine.remove_module(&user, course_id, module_id).await?))
}

pub async fn add_lesson(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((course_id, module_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<LessonInput>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = CourseEngine::new(state.conn.clone());
    Ok(created_json(
        engine.add_lesson(&user, course_id, module_id, req).await?,
    ))
}

pub async fn remove_lesson(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((course_id, module_id, lesson_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = CourseEngine::new(state.conn.clone());
    Ok(ok_json(
        engine
            .remove_lesson(&user, course_id, module_id, lesson_id)
            .await?,
    ))
}

pub async fn submit_course(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = CourseEngine::new(state.conn.clone());
    Ok(ok_json(engine.submit_for_approval(&user, course_id).await?))
}

pub async fn review_course(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(course_id): Path<Uuid>,
    Json(req): Json<ReviewCourseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = CourseEngine::new(state.conn.clone());
    Ok(ok_json(engine.review_course(&user, course_id, req).await?))
}

pub async fn unpublish_course(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = CourseEngine::new(state.conn.clone());
    Ok(ok_json(engine.unpublish(&user, course_id).await?))
}
