//! # Learn Module - Course catalog, enrollment and assessment
//!
//! - Course authoring with modules and lessons, reviewed by admins before publication
//! - Enrollment requests approved by admins or the course's formateur
//! - Per-lesson progress tracking with completion percentage
//! - Quizzes with attempt limits and server-side scoring
//!
//! ## Architecture
//!
//! Each area owns an engine (`CourseEngine`, `EnrollmentEngine`, `ProgressEngine`,
//! `QuizEngine`) built from the shared pool, plus thin Axum handlers. Cross-user
//! side effects (notifications, progress rows, counters) happen inside the same
//! Diesel transaction as the change that causes them.

pub mod courses;
pub mod enrollment;
pub mod progress;
pub mod quiz;
pub mod types;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

pub use courses::CourseEngine;
pub use enrollment::EnrollmentEngine;
pub use progress::ProgressEngine;
pub use quiz::QuizEngine;
pub use types::{
    Course, CourseModule, CourseStatus, EnrollmentRequest, EnrollmentStatus, Lesson, Progress,
    Quiz, QuizAttempt, QuizQuestion,
};

// ============================================================================
// ROUTE CONFIGURATION
// ============================================================================

pub fn configure_learn_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Courses
        .route(
            ApiUrls::COURSES,
            get(courses::list_catalog).post(courses::create_course),
        )
        .route(ApiUrls::COURSES_MINE, get(courses::list_my_courses))
        .route(ApiUrls::COURSES_ADMIN, get(courses::list_all_courses))
        .route(
            ApiUrls::COURSE_BY_ID,
            get(courses::get_course)
                .put(courses::update_course)
                .delete(courses::delete_course),
        )
        .route(ApiUrls::COURSE_MODULES, post(courses::add_module))
        .route(ApiUrls::COURSE_MODULE_BY_ID, delete(courses::remove_module))
        .route(ApiUrls::COURSE_LESSONS, post(courses::add_lesson))
        .route(ApiUrls::COURSE_LESSON_BY_ID, delete(courses::remove_lesson))
        .route(ApiUrls::COURSE_SUBMIT, post(courses::submit_course))
        .route(ApiUrls::COURSE_REVIEW, post(courses::review_course))
        .route(ApiUrls::COURSE_UNPUBLISH, post(courses::unpublish_course))
        .route(ApiUrls::COURSE_PROGRESS, get(progress::course_progress))
        .route(
            ApiUrls::COURSE_ENROLLMENTS,
            get(enrollment::list_course_requests),
        )
        .route(
            ApiUrls::COURSE_QUIZZES,
            get(quiz::list_course_quizzes).post(quiz::create_quiz),
        )
        // Enrollment requests
        .route(
            ApiUrls::ENROLLMENTS,
            get(enrollment::list_my_requests).post(enrollment::request_enrollment),
        )
        .route(
            ApiUrls::ENROLLMENTS_PENDING,
            get(enrollment::list_pending_requests),
        )
        .route(
            ApiUrls::ENROLLMENT_BY_ID,
            get(enrollment::get_request).delete(enrollment::cancel_request),
        )
        .route(
            ApiUrls::ENROLLMENT_RESPOND,
            post(enrollment::respond_to_request),
        )
        // Progress
        .route(ApiUrls::PROGRESS, get(progress::list_progress))
        .route(ApiUrls::PROGRESS_BY_COURSE, get(progress::get_progress))
        .route(
            ApiUrls::PROGRESS_LESSON,
            post(progress::complete_lesson).delete(progress::uncomplete_lesson),
        )
        // Quizzes
        .route(
            ApiUrls::QUIZ_BY_ID,
            get(quiz::get_quiz)
                .put(quiz::update_quiz)
                .delete(quiz::delete_quiz),
        )
        .route(
            ApiUrls::QUIZ_ATTEMPTS,
            get(quiz::list_attempts).post(quiz::submit_attempt),
        )
}
