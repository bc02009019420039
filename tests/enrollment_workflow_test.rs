//! End-to-end engine workflow against a real PostgreSQL.
//!
//! Runs only when `DATABASE_URL` points at a disposable database; otherwise every test
//! returns early.

use diesel::prelude::*;
use learnserver::core::config::DatabaseConfig;
use learnserver::core::shared::error::ApiError;
use learnserver::core::shared::utils::{create_conn, run_migrations};
use learnserver::core::shared::schema::{
    learn_enrollment_requests, learn_progress, learn_quiz_attempts, learn_quizzes,
};
use learnserver::core::shared::DbPool;
use learnserver::directory::{UserDirectory, UserRole};
use learnserver::learn::types::{
    CreateCourseRequest, CreateEnrollmentRequest, CreateQuizRequest, LessonInput, ModuleInput,
    QuestionType, QuizQuestionInput, QuizSubmission, RespondEnrollmentRequest,
    ReviewCourseRequest,
};
use learnserver::learn::{CourseEngine, EnrollmentEngine, ProgressEngine, QuizEngine};
use learnserver::notifications::types::NotificationFilters;
use learnserver::notifications::{Notification, NotificationEngine};
use learnserver::security::auth_api::{AuthenticatedUser, Role};
use std::collections::HashMap;
use uuid::Uuid;

fn test_pool() -> Option<DbPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let config = DatabaseConfig {
        url,
        max_connections: 4,
        connect_timeout_secs: 5,
    };
    let pool = create_conn(&config).ok()?;
    run_migrations(&pool).ok()?;
    Some(pool)
}

async fn account(pool: &DbPool, role: UserRole, auth_role: Role) -> AuthenticatedUser {
    let email = format!("{}@workflow.test", Uuid::new_v4());
    let user = UserDirectory::new(pool.clone())
        .create(&email, "Sup3r-secret-pass", "Workflow User", role)
        .await
        .unwrap();
    AuthenticatedUser::new(user.id, user.display_name, auth_role).with_email(user.email)
}

struct Fixture {
    pool: DbPool,
    admin: AuthenticatedUser,
    formateur: AuthenticatedUser,
    student: AuthenticatedUser,
    course_id: Uuid,
}

async fn published_course(pool: DbPool) -> Fixture {
    published_course_with_lessons(pool, 1).await
}

async fn published_course_with_lessons(pool: DbPool, lessons: usize) -> Fixture {
    let admin = account(&pool, UserRole::Admin, Role::Admin).await;
    let formateur = account(&pool, UserRole::Formateur, Role::Formateur).await;
    let student = account(&pool, UserRole::Student, Role::Student).await;

    let courses = CourseEngine::new(pool.clone());
    let course = courses
        .create_course(
            &formateur,
            CreateCourseRequest {
                title: "Ownership and Borrowing".to_string(),
                description: "Moves, borrows and lifetimes".to_string(),
                category: Some("programming".to_string()),
                modules: Some(vec![ModuleInput {
                    id: None,
                    title: "Basics".to_string(),
                    lessons: (1..=lessons)
                        .map(|n| LessonInput {
                            id: None,
                            title: format!("Moves, part {}", n),
                            content: Some("Values have one owner.".to_string()),
                            content_type: None,
                            duration_minutes: Some(10),
                            video_url: None,
                        })
                        .collect(),
                }]),
                image_url: None,
            },
        )
        .await
        .unwrap();
    courses.submit_for_approval(&formateur, course.id).await.unwrap();
    courses
        .review_course(
            &admin,
            course.id,
            ReviewCourseRequest {
                approve: true,
                reason: None,
            },
        )
        .await
        .unwrap();

    Fixture {
        pool,
        admin,
        formateur,
        student,
        course_id: course.id,
    }
}

async fn student_notifications(fx: &Fixture) -> Vec<Notification> {
    NotificationEngine::new(fx.pool.clone())
        .list(fx.student.user_id, &NotificationFilters::default())
        .await
        .unwrap()
}

fn completion_notices(notes: &[Notification]) -> usize {
    notes
        .iter()
        .filter(|n| n.notification_type == "course" && n.title == "Course completed")
        .count()
}

async fn lesson_ids(fx: &Fixture) -> Vec<Uuid> {
    CourseEngine::new(fx.pool.clone())
        .get_course(&fx.formateur, fx.course_id)
        .await
        .unwrap()
        .lesson_ids()
        .unwrap()
}

async fn enroll(fx: &Fixture) {
    let enrollments = EnrollmentEngine::new(fx.pool.clone());
    let request = enrollments
        .request_enrollment(
            &fx.student,
            CreateEnrollmentRequest {
                course_id: fx.course_id,
                message: Some("I would like to join".to_string()),
            },
        )
        .await
        .unwrap();
    enrollments
        .respond(
            &fx.formateur,
            request.id,
            RespondEnrollmentRequest {
                approve: true,
                response_message: None,
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_approval_creates_progress_once_and_notifies() {
    let Some(pool) = test_pool() else {
        return;
    };
    let fx = published_course(pool).await;

    let enrollments = EnrollmentEngine::new(fx.pool.clone());
    let request = enrollments
        .request_enrollment(
            &fx.student,
            CreateEnrollmentRequest {
                course_id: fx.course_id,
                message: None,
            },
        )
        .await
        .unwrap();

    let duplicate = enrollments
        .request_enrollment(
            &fx.student,
            CreateEnrollmentRequest {
                course_id: fx.course_id,
                message: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(duplicate, ApiError::Conflict(_)));

    let approve = || RespondEnrollmentRequest {
        approve: true,
        response_message: Some("Welcome".to_string()),
    };
    enrollments
        .respond(&fx.admin, request.id, approve())
        .await
        .unwrap();
    let again = enrollments
        .respond(&fx.admin, request.id, approve())
        .await
        .unwrap_err();
    assert!(matches!(again, ApiError::Conflict(_)));

    let progress = ProgressEngine::new(fx.pool.clone())
        .get_progress(&fx.student, fx.course_id)
        .await
        .unwrap();
    assert_eq!(progress.progress.progress, 0);
    assert_eq!(progress.total_lessons, 1);

    let course = CourseEngine::new(fx.pool.clone())
        .get_course(&fx.student, fx.course_id)
        .await
        .unwrap();
    assert_eq!(course.student_count, 1);

    let notes = NotificationEngine::new(fx.pool.clone())
        .list(fx.student.user_id, &NotificationFilters::default())
        .await
        .unwrap();
    let decisions = notes
        .iter()
        .filter(|n| n.notification_type == "enrollment")
        .count();
    assert_eq!(decisions, 1);
}

#[tokio::test]
async fn test_quiz_attempts_stop_at_the_limit() {
    let Some(pool) = test_pool() else {
        return;
    };
    let fx = published_course(pool).await;
    let question_id = Uuid::new_v4();

    let quizzes = QuizEngine::new(fx.pool.clone());
    let quiz = quizzes
        .create_quiz(
            &fx.formateur,
            fx.course_id,
            CreateQuizRequest {
                module_id: None,
                title: "Ownership check".to_string(),
                description: None,
                questions: vec![QuizQuestionInput {
                    id: Some(question_id),
                    text: "Does a move invalidate the source?".to_string(),
                    question_type: QuestionType::TrueFalse,
                    options: vec!["Yes".to_string(), "No".to_string()],
                    correct_answers: vec![0],
                    points: Some(1),
                    explanation: None,
                }],
                passing_score: Some(100),
                max_attempts: Some(2),
                time_limit_minutes: None,
            },
        )
        .await
        .unwrap();

    let submission = |choice: usize| QuizSubmission {
        answers: HashMap::from([(question_id.to_string(), vec![choice])]),
        time_spent_seconds: 30,
    };

    let before_enrolling = quizzes
        .submit_attempt(&fx.student, quiz.id, submission(0))
        .await
        .unwrap_err();
    assert!(matches!(before_enrolling, ApiError::Forbidden(_)));

    enroll(&fx).await;

    let first = quizzes
        .submit_attempt(&fx.student, quiz.id, submission(1))
        .await
        .unwrap();
    assert!(!first.passed);
    assert_eq!(first.remaining_attempts, Some(1));

    let second = quizzes
        .submit_attempt(&fx.student, quiz.id, submission(0))
        .await
        .unwrap();
    assert!(second.passed);
    assert_eq!(second.attempt_number, 2);
    assert_eq!(second.remaining_attempts, Some(0));

    let third = quizzes
        .submit_attempt(&fx.student, quiz.id, submission(0))
        .await
        .unwrap_err();
    assert!(matches!(third, ApiError::LimitReached(_)));

    let best = quizzes
        .best_attempt(fx.student.user_id, quiz.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(best.attempt_number, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_completions_are_all_kept() {
    let Some(pool) = test_pool() else {
        return;
    };
    let fx = published_course_with_lessons(pool, 8).await;
    enroll(&fx).await;
    let lessons = lesson_ids(&fx).await;
    assert_eq!(lessons.len(), 8);

    let handles: Vec<_> = lessons
        .iter()
        .map(|&lesson_id| {
            let engine = ProgressEngine::new(fx.pool.clone());
            let student = fx.student.clone();
            let course_id = fx.course_id;
            tokio::spawn(async move { engine.complete_lesson(&student, course_id, lesson_id).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let detail = ProgressEngine::new(fx.pool.clone())
        .get_progress(&fx.student, fx.course_id)
        .await
        .unwrap();
    let mut stored = detail.progress.lesson_list();
    stored.sort();
    let mut expected = lessons.clone();
    expected.sort();
    assert_eq!(stored, expected);
    assert_eq!(detail.progress.progress, 100);
    assert!(detail.progress.completed);

    assert_eq!(completion_notices(&student_notifications(&fx).await), 1);
}

#[tokio::test]
async fn test_completion_is_notified_once_across_reopening() {
    let Some(pool) = test_pool() else {
        return;
    };
    let fx = published_course_with_lessons(pool, 2).await;
    enroll(&fx).await;
    let lessons = lesson_ids(&fx).await;
    let progress = ProgressEngine::new(fx.pool.clone());

    let half = progress
        .complete_lesson(&fx.student, fx.course_id, lessons[0])
        .await
        .unwrap();
    assert_eq!(half.progress, 50);
    assert!(!half.completed);

    let done = progress
        .complete_lesson(&fx.student, fx.course_id, lessons[1])
        .await
        .unwrap();
    assert_eq!(done.progress, 100);
    assert!(done.completed);
    let first_finished_at = done.completed_at;
    assert!(first_finished_at.is_some());

    let repeat = progress
        .complete_lesson(&fx.student, fx.course_id, lessons[1])
        .await
        .unwrap();
    assert_eq!(repeat.lesson_list().len(), 2);

    let reopened = progress
        .uncomplete_lesson(&fx.student, fx.course_id, lessons[1])
        .await
        .unwrap();
    assert_eq!(reopened.progress, 50);
    assert!(!reopened.completed);

    let again = progress
        .complete_lesson(&fx.student, fx.course_id, lessons[1])
        .await
        .unwrap();
    assert_eq!(again.progress, 100);
    assert!(again.completed);
    assert_eq!(again.completed_at, first_finished_at);

    assert_eq!(completion_notices(&student_notifications(&fx).await), 1);

    let unknown = progress
        .complete_lesson(&fx.student, fx.course_id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(unknown, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_denied_request_leaves_no_enrollment() {
    let Some(pool) = test_pool() else {
        return;
    };
    let fx = published_course(pool).await;

    let enrollments = EnrollmentEngine::new(fx.pool.clone());
    let request = enrollments
        .request_enrollment(
            &fx.student,
            CreateEnrollmentRequest {
                course_id: fx.course_id,
                message: None,
            },
        )
        .await
        .unwrap();
    let denied = enrollments
        .respond(
            &fx.formateur,
            request.id,
            RespondEnrollmentRequest {
                approve: false,
                response_message: Some("The cohort is full".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(denied.status, "denied");
    assert_eq!(denied.responded_by, Some(fx.formateur.user_id));

    let missing = ProgressEngine::new(fx.pool.clone())
        .get_progress(&fx.student, fx.course_id)
        .await
        .unwrap_err();
    assert!(matches!(missing, ApiError::NotFound(_)));

    let course = CourseEngine::new(fx.pool.clone())
        .get_course(&fx.student, fx.course_id)
        .await
        .unwrap();
    assert_eq!(course.student_count, 0);

    let notes = student_notifications(&fx).await;
    let decisions: Vec<_> = notes
        .iter()
        .filter(|n| n.notification_type == "enrollment")
        .collect();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].title, "Enrollment denied");
    assert!(decisions[0].message.contains("The cohort is full"));

    let not_enrolled = ProgressEngine::new(fx.pool.clone())
        .complete_lesson(&fx.student, fx.course_id, lesson_ids(&fx).await[0])
        .await
        .unwrap_err();
    assert!(matches!(not_enrolled, ApiError::Forbidden(_)));
}

#[tokio::test]
async fn test_cancel_only_withdraws_pending_requests() {
    let Some(pool) = test_pool() else {
        return;
    };
    let fx = published_course(pool).await;
    let enrollments = EnrollmentEngine::new(fx.pool.clone());
    let ask = || CreateEnrollmentRequest {
        course_id: fx.course_id,
        message: None,
    };

    let first = enrollments.request_enrollment(&fx.student, ask()).await.unwrap();
    enrollments.cancel(&fx.student, first.id).await.unwrap();
    let gone = enrollments.get(&fx.student, first.id).await.unwrap_err();
    assert!(matches!(gone, ApiError::NotFound(_)));

    let second = enrollments.request_enrollment(&fx.student, ask()).await.unwrap();
    enrollments
        .respond(
            &fx.admin,
            second.id,
            RespondEnrollmentRequest {
                approve: true,
                response_message: None,
            },
        )
        .await
        .unwrap();

    let decided = enrollments.cancel(&fx.student, second.id).await.unwrap_err();
    assert!(matches!(decided, ApiError::Conflict(_)));
    let kept = enrollments.get(&fx.student, second.id).await.unwrap();
    assert_eq!(kept.status, "approved");
}

#[tokio::test]
async fn test_delete_course_removes_its_records() {
    let Some(pool) = test_pool() else {
        return;
    };
    let fx = published_course(pool).await;
    let question_id = Uuid::new_v4();

    let quiz = QuizEngine::new(fx.pool.clone())
        .create_quiz(
            &fx.formateur,
            fx.course_id,
            CreateQuizRequest {
                module_id: None,
                title: "Borrow check".to_string(),
                description: None,
                questions: vec![QuizQuestionInput {
                    id: Some(question_id),
                    text: "Can two mutable borrows overlap?".to_string(),
                    question_type: QuestionType::TrueFalse,
                    options: vec!["Yes".to_string(), "No".to_string()],
                    correct_answers: vec![1],
                    points: Some(1),
                    explanation: None,
                }],
                passing_score: None,
                max_attempts: None,
                time_limit_minutes: None,
            },
        )
        .await
        .unwrap();
    enroll(&fx).await;
    QuizEngine::new(fx.pool.clone())
        .submit_attempt(
            &fx.student,
            quiz.id,
            QuizSubmission {
                answers: HashMap::from([(question_id.to_string(), vec![1])]),
                time_spent_seconds: 12,
            },
        )
        .await
        .unwrap();

    let courses = CourseEngine::new(fx.pool.clone());
    let published = courses.delete_course(&fx.formateur, fx.course_id).await.unwrap_err();
    assert!(matches!(published, ApiError::Conflict(_)));
    courses.delete_course(&fx.admin, fx.course_id).await.unwrap();

    let mut conn = fx.pool.get().unwrap();
    let quizzes: i64 = learn_quizzes::table
        .filter(learn_quizzes::course_id.eq(fx.course_id))
        .count()
        .get_result(&mut conn)
        .unwrap();
    let attempts: i64 = learn_quiz_attempts::table
        .filter(learn_quiz_attempts::course_id.eq(fx.course_id))
        .count()
        .get_result(&mut conn)
        .unwrap();
    let requests: i64 = learn_enrollment_requests::table
        .filter(learn_enrollment_requests::course_id.eq(fx.course_id))
        .count()
        .get_result(&mut conn)
        .unwrap();
    let progress: i64 = learn_progress::table
        .filter(learn_progress::course_id.eq(fx.course_id))
        .count()
        .get_result(&mut conn)
        .unwrap();
    assert_eq!((quizzes, attempts, requests, progress), (0, 0, 0, 0));

    let missing = courses.get_course(&fx.admin, fx.course_id).await.unwrap_err();
    assert!(matches!(missing, ApiError::NotFound(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_lesson_edits_are_all_kept() {
    let Some(pool) = test_pool() else {
        return;
    };
    let fx = published_course(pool).await;
    let courses = CourseEngine::new(fx.pool.clone());
    let course = courses.get_course(&fx.formateur, fx.course_id).await.unwrap();
    let module_id = course.module_list().unwrap()[0].id;

    let handles: Vec<_> = (1..=6)
        .map(|n| {
            let engine = CourseEngine::new(fx.pool.clone());
            let formateur = fx.formateur.clone();
            let course_id = fx.course_id;
            tokio::spawn(async move {
                engine
                    .add_lesson(
                        &formateur,
                        course_id,
                        module_id,
                        LessonInput {
                            id: None,
                            title: format!("Lifetimes, part {}", n),
                            content: None,
                            content_type: None,
                            duration_minutes: Some(5),
                            video_url: None,
                        },
                    )
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let lessons = lesson_ids(&fx).await;
    assert_eq!(lessons.len(), 7);

    let existing = lessons[0];
    let repeated = courses
        .add_lesson(
            &fx.formateur,
            fx.course_id,
            module_id,
            LessonInput {
                id: Some(existing),
                title: "Again".to_string(),
                content: None,
                content_type: None,
                duration_minutes: None,
                video_url: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(repeated, ApiError::Conflict(_)));
}
