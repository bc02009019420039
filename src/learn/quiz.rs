use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel::PgConnection;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::courses::{ensure_can_manage, ensure_visible, load_course, validate_title};
use super::enrollment::is_enrolled;
use super::types::{
    AnswerResult, AttemptSummary, CourseModule, CreateQuizRequest, QuestionType, QuestionView, Quiz,
    QuizAttempt, QuizQuestion, QuizQuestionInput, QuizResult, QuizSubmission, QuizView,
    UpdateQuizRequest, DEFAULT_MAX_ATTEMPTS, DEFAULT_PASSING_SCORE,
};
use crate::core::shared::error::ApiError;
use crate::core::shared::schema::{learn_quiz_attempts, learn_quizzes};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{created_json, message_json, ok_json, with_conn, DbPool};
use crate::core::urls::ApiUrls;
use crate::notifications::{notify, NotificationDraft, NotificationType};
use crate::security::auth_api::{AuthenticatedUser, Permission};

pub const MAX_QUESTION_POINTS: i32 = 1000;
pub const MAX_QUESTIONS: usize = 200;

// ============================================================================
// VALIDATION
// ============================================================================

pub fn validate_questions(questions: &[QuizQuestion]) -> Result<(), ApiError> {
    if questions.is_empty() {
        return Err(ApiError::Validation(
            "A quiz needs at least one question".to_string(),
        ));
    }
    if questions.len() > MAX_QUESTIONS {
        return Err(ApiError::Validation(format!(
            "A quiz has at most {} questions",
            MAX_QUESTIONS
        )));
    }

    let mut ids = HashSet::new();
    for (index, q) in questions.iter().enumerate() {
        let n = index + 1;
        let invalid = |msg: &str| ApiError::Validation(format!("Question {}: {}", n, msg));

        if !ids.insert(q.id) {
            return Err(invalid("duplicate question id"));
        }
        if q.text.trim().is_empty() {
            return Err(invalid("text is required"));
        }
        if q.options.is_empty() || q.options.iter().any(|o| o.trim().is_empty()) {
            return Err(invalid("options must be non-empty"));
        }
        if !(0..=MAX_QUESTION_POINTS).contains(&q.points) {
            return Err(invalid(&format!(
                "points must be between 0 and {}",
                MAX_QUESTION_POINTS
            )));
        }

        let correct: BTreeSet<usize> = q.correct_answers.iter().copied().collect();
        if correct.is_empty() {
            return Err(invalid("at least one correct answer is required"));
        }
        if correct.iter().any(|&i| i >= q.options.len()) {
            return Err(invalid("correct answer index out of range"));
        }

        match q.question_type {
            QuestionType::SingleChoice if correct.len() != 1 => {
                return Err(invalid("single choice questions have exactly one correct answer"));
            }
            QuestionType::TrueFalse if q.options.len() != 2 || correct.len() != 1 => {
                return Err(invalid(
                    "true/false questions have two options and one correct answer",
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

pub fn validate_settings(
    passing_score: i32,
    max_attempts: Option<i32>,
    time_limit_minutes: Option<i32>,
) -> Result<(), ApiError> {
    if !(0..=100).contains(&passing_score) {
        return Err(ApiError::Validation(
            "Passing score must be between 0 and 100".to_string(),
        ));
    }
    if matches!(max_attempts, Some(n) if n < 1) {
        return Err(ApiError::Validation(
            "Max attempts must be at least 1".to_string(),
        ));
    }
    if matches!(time_limit_minutes, Some(n) if n < 1) {
        return Err(ApiError::Validation(
            "Time limit must be at least 1 minute".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// SCORING
// ============================================================================

#[derive(Debug, Clone)]
pub struct ScoreCard {
    pub score: i32,
    pub max_score: i32,
    pub percentage: f32,
    pub breakdown: Vec<AnswerResult>,
}

/// One pass over the questions. Answers match when they select the same set of options;
/// order and repeats do not matter. A missing answer scores zero. Totals saturate
/// instead of overflowing on stored quizzes with out-of-range points.
pub fn score_quiz(questions: &[QuizQuestion], answers: &HashMap<String, Vec<usize>>) -> ScoreCard {
    let mut score: i32 = 0;
    let mut max_score: i32 = 0;
    let mut breakdown = Vec::with_capacity(questions.len());

    for question in questions {
        let points = question.points.max(0);
        max_score = max_score.saturating_add(points);
        let user_answers = answers
            .get(&question.id.to_string())
            .cloned()
            .unwrap_or_default();

        let given: BTreeSet<usize> = user_answers.iter().copied().collect();
        let expected: BTreeSet<usize> = question.correct_answers.iter().copied().collect();
        let is_correct = given == expected;
        let points_earned = if is_correct { points } else { 0 };
        score = score.saturating_add(points_earned);

        breakdown.push(AnswerResult {
            question_id: question.id,
            is_correct,
            points_earned,
            correct_answers: question.correct_answers.clone(),
            user_answers,
            explanation: question.explanation.clone(),
        });
    }

    let percentage = if max_score > 0 {
        score as f32 / max_score as f32 * 100.0
    } else {
        0.0
    };

    ScoreCard {
        score,
        max_score,
        percentage,
        breakdown,
    }
}

pub fn is_passing(percentage: f32, passing_score: i32) -> bool {
    percentage >= passing_score as f32
}

pub fn remaining_attempts(max_attempts: Option<i32>, used: i64) -> Option<i32> {
    max_attempts.map(|max| (max as i64 - used).max(0) as i32)
}

/// Highest percentage wins; ties go to the earlier attempt.
pub fn best_of(attempts: &[QuizAttempt]) -> Option<&QuizAttempt> {
    attempts.iter().fold(None, |best: Option<&QuizAttempt>, a| match best {
        Some(b)
            if b.percentage > a.percentage
                || (b.percentage == a.percentage && b.attempt_number <= a.attempt_number) =>
        {
            Some(b)
        }
        _ => Some(a),
    })
}

pub fn quiz_view(quiz: &Quiz) -> Result<QuizView, ApiError> {
    let questions = quiz.question_list()?;
    Ok(QuizView {
        id: quiz.id,
        course_id: quiz.course_id,
        module_id: quiz.module_id,
        title: quiz.title.clone(),
        description: quiz.description.clone(),
        total_points: questions
            .iter()
            .fold(0i32, |total, q| total.saturating_add(q.points.max(0))),
        questions: questions.iter().map(QuestionView::from).collect(),
        passing_score: quiz.passing_score,
        max_attempts: quiz.max_attempts,
        time_limit_minutes: quiz.time_limit_minutes,
    })
}

/// Course managers see answers; everyone else sees the questions only.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum QuizPayload {
    Full(Quiz),
    View(QuizView),
}

fn build_questions(inputs: Vec<QuizQuestionInput>) -> Result<Vec<QuizQuestion>, ApiError> {
    let questions: Vec<QuizQuestion> = inputs
        .into_iter()
        .map(QuizQuestionInput::into_question)
        .collect();
    validate_questions(&questions)?;
    Ok(questions)
}

fn load_quiz(conn: &mut PgConnection, quiz_id: Uuid) -> Result<Quiz, ApiError> {
    learn_quizzes::table
        .find(quiz_id)
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Quiz"))
}

/// Locks the quiz row so attempt numbering is serialised; call inside a transaction.
fn lock_quiz(conn: &mut PgConnection, quiz_id: Uuid) -> Result<Quiz, ApiError> {
    learn_quizzes::table
        .find(quiz_id)
        .for_update()
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Quiz"))
}

fn ensure_module_exists(modules: &[CourseModule], module_id: Option<Uuid>) -> Result<(), ApiError> {
    match module_id {
        Some(id) if !modules.iter().any(|m| m.id == id) => Err(ApiError::not_found("Module")),
        _ => Ok(()),
    }
}

// ============================================================================
// QUIZ ENGINE
// ============================================================================

pub struct QuizEngine {
    db: DbPool,
}

impl QuizEngine {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn create_quiz(
        &self,
        user: &AuthenticatedUser,
        course_id: Uuid,
        req: CreateQuizRequest,
    ) -> Result<Quiz, ApiError> {
        user.require(&Permission::ManageQuizzes)?;

        let passing_score = req.passing_score.unwrap_or(DEFAULT_PASSING_SCORE);
        let max_attempts = Some(req.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS));
        validate_settings(passing_score, max_attempts, req.time_limit_minutes)?;
        let questions = build_questions(req.questions)?;

        let now = Utc::now();
        let quiz = Quiz {
            id: Uuid::new_v4(),
            course_id,
            module_id: req.module_id,
            title: validate_title(&req.title)?,
            description: req.description.filter(|d| !d.trim().is_empty()),
            questions: serde_json::to_value(&questions)?,
            passing_score,
            max_attempts,
            time_limit_minutes: req.time_limit_minutes,
            created_by: user.user_id,
            created_at: now,
            updated_at: now,
        };
        let actor = user.clone();

        let quiz = with_conn(&self.db, move |conn| {
            let course = load_course(conn, course_id)?;
            ensure_can_manage(&actor, &course)?;
            ensure_module_exists(&course.module_list()?, quiz.module_id)?;

            diesel::insert_into(learn_quizzes::table)
                .values(&quiz)
                .execute(conn)?;
            Ok(quiz)
        })
        .await?;

        info!("User {} created quiz {} in course {}", user.user_id, quiz.id, course_id);
        Ok(quiz)
    }

    pub async fn update_quiz(
        &self,
        user: &AuthenticatedUser,
        quiz_id: Uuid,
        req: UpdateQuizRequest,
    ) -> Result<Quiz, ApiError> {
        user.require(&Permission::ManageQuizzes)?;

        let questions = match req.questions {
            Some(inputs) => Some(serde_json::to_value(build_questions(inputs)?)?),
            None => None,
        };
        let title = req.title.as_deref().map(validate_title).transpose()?;
        let actor = user.clone();

        let updated = with_conn(&self.db, move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                let quiz = lock_quiz(conn, quiz_id)?;
                let course = load_course(conn, quiz.course_id)?;
                ensure_can_manage(&actor, &course)?;

                let module_id = req.module_id.or(quiz.module_id);
                ensure_module_exists(&course.module_list()?, module_id)?;

                let passing_score = req.passing_score.unwrap_or(quiz.passing_score);
                let max_attempts = req.max_attempts.or(quiz.max_attempts);
                let time_limit_minutes = req.time_limit_minutes.or(quiz.time_limit_minutes);
                validate_settings(passing_score, max_attempts, time_limit_minutes)?;

                let description = match req.description {
                    Some(d) if d.trim().is_empty() => None,
                    Some(d) => Some(d),
                    None => quiz.description,
                };

                Ok(diesel::update(learn_quizzes::table.find(quiz_id))
                    .set((
                        learn_quizzes::module_id.eq(module_id),
                        learn_quizzes::title.eq(title.unwrap_or(quiz.title)),
                        learn_quizzes::description.eq(description),
                        learn_quizzes::questions.eq(questions.unwrap_or(quiz.questions)),
                        learn_quizzes::passing_score.eq(passing_score),
                        learn_quizzes::max_attempts.eq(max_attempts),
                        learn_quizzes::time_limit_minutes.eq(time_limit_minutes),
                        learn_quizzes::updated_at.eq(Utc::now()),
                    ))
                    .get_result(conn)?)
            })
        })
        .await?;

        info!("User {} updated quiz {}", user.user_id, quiz_id);
        Ok(updated)
    }

    pub async fn delete_quiz(&self, user: &AuthenticatedUser, quiz_id: Uuid) -> Result<(), ApiError> {
        user.require(&Permission::ManageQuizzes)?;
        let actor = user.clone();

        with_conn(&self.db, move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                let quiz = lock_quiz(conn, quiz_id)?;
                let course = load_course(conn, quiz.course_id)?;
                ensure_can_manage(&actor, &course)?;

                diesel::delete(
                    learn_quiz_attempts::table.filter(learn_quiz_attempts::quiz_id.eq(quiz_id)),
                )
                .execute(conn)?;
                diesel::delete(learn_quizzes::table.find(quiz_id)).execute(conn)?;
                Ok(())
            })
        })
        .await?;

        info!("User {} deleted quiz {}", user.user_id, quiz_id);
        Ok(())
    }

    pub async fn list_for_course(
        &self,
        user: &AuthenticatedUser,
        course_id: Uuid,
    ) -> Result<Vec<QuizPayload>, ApiError> {
        let (course, quizzes) = with_conn(&self.db, move |conn| {
            let course = load_course(conn, course_id)?;
            let quizzes: Vec<Quiz> = learn_quizzes::table
                .filter(learn_quizzes::course_id.eq(course_id))
                .order(learn_quizzes::created_at.asc())
                .load(conn)?;
            Ok((course, quizzes))
        })
        .await?;
        ensure_visible(user, &course)?;

        if user.can_manage(&course.instructor_id) {
            return Ok(quizzes.into_iter().map(QuizPayload::Full).collect());
        }
        quizzes
            .iter()
            .map(|q| quiz_view(q).map(QuizPayload::View))
            .collect()
    }

    pub async fn get_quiz(&self, user: &AuthenticatedUser, quiz_id: Uuid) -> Result<QuizPayload, ApiError> {
        let (quiz, course) = with_conn(&self.db, move |conn| {
            let quiz = load_quiz(conn, quiz_id)?;
            let course = load_course(conn, quiz.course_id)?;
            Ok((quiz, course))
        })
        .await?;
        ensure_visible(user, &course)?;

        if user.can_manage(&course.instructor_id) {
            Ok(QuizPayload::Full(quiz))
        } else {
            Ok(QuizPayload::View(quiz_view(&quiz)?))
        }
    }

    /// Scores and stores an attempt. Enrollment is required and the attempt limit, when
    /// set, is checked under the quiz row lock in the same transaction as the insert.
    pub async fn submit_attempt(
        &self,
        user: &AuthenticatedUser,
        quiz_id: Uuid,
        submission: QuizSubmission,
    ) -> Result<QuizResult, ApiError> {
        user.require(&Permission::TakeQuizzes)?;
        let user_id = user.user_id;

        let (quiz, card, attempt) = with_conn(&self.db, move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                let quiz = lock_quiz(conn, quiz_id)?;
                if !is_enrolled(conn, user_id, quiz.course_id)? {
                    return Err(ApiError::Forbidden(
                        "You are not enrolled in this course".to_string(),
                    ));
                }

                let used: i64 = learn_quiz_attempts::table
                    .filter(learn_quiz_attempts::quiz_id.eq(quiz_id))
                    .filter(learn_quiz_attempts::user_id.eq(user_id))
                    .count()
                    .get_result(conn)?;
                if matches!(quiz.max_attempts, Some(max) if used >= max as i64) {
                    return Err(ApiError::LimitReached(
                        "Maximum number of attempts reached".to_string(),
                    ));
                }

                let card = score_quiz(&quiz.question_list()?, &submission.answers);
                let passed = is_passing(card.percentage, quiz.passing_score);
                let attempt = QuizAttempt {
                    id: Uuid::new_v4(),
                    quiz_id,
                    user_id,
                    course_id: quiz.course_id,
                    answers: serde_json::to_value(&submission.answers)?,
                    score: card.score,
                    max_score: card.max_score,
                    percentage: card.percentage,
                    passed,
                    time_spent_seconds: submission.time_spent_seconds.max(0),
                    attempt_number: used as i32 + 1,
                    submitted_at: Utc::now(),
                };
                diesel::insert_into(learn_quiz_attempts::table)
                    .values(&attempt)
                    .execute(conn)?;

                if passed {
                    let draft = NotificationDraft::new(
                        NotificationType::Quiz,
                        "Quiz passed",
                        format!(
                            "You scored {:.0}% on \"{}\"",
                            card.percentage, quiz.title
                        ),
                    )
                    .with_link(ApiUrls::quiz(quiz_id));
                    notify(conn, user_id, &draft)?;
                }
                Ok((quiz, card, attempt))
            })
        })
        .await?;

        info!(
            "User {} submitted attempt {} on quiz {}: {}/{} ({})",
            user_id,
            attempt.attempt_number,
            quiz_id,
            card.score,
            card.max_score,
            if attempt.passed { "passed" } else { "failed" }
        );

        Ok(QuizResult {
            attempt_id: attempt.id,
            quiz_id,
            score: card.score,
            max_score: card.max_score,
            percentage: card.percentage,
            passed: attempt.passed,
            attempt_number: attempt.attempt_number,
            remaining_attempts: remaining_attempts(quiz.max_attempts, attempt.attempt_number as i64),
            answers_breakdown: card.breakdown,
        })
    }

    /// Own attempts for learners; every attempt for the course's managers.
    pub async fn list_attempts(
        &self,
        user: &AuthenticatedUser,
        quiz_id: Uuid,
    ) -> Result<AttemptSummary, ApiError> {
        user.require_authenticated()?;
        let actor = user.clone();

        with_conn(&self.db, move |conn| {
            let quiz = load_quiz(conn, quiz_id)?;
            let course = load_course(conn, quiz.course_id)?;

            if actor.can_manage(&course.instructor_id) {
                let attempts: Vec<QuizAttempt> = learn_quiz_attempts::table
                    .filter(learn_quiz_attempts::quiz_id.eq(quiz_id))
                    .order(learn_quiz_attempts::submitted_at.desc())
                    .load(conn)?;
                return Ok(AttemptSummary {
                    best: best_of(&attempts).cloned(),
                    attempts,
                    remaining_attempts: None,
                });
            }

            actor.require(&Permission::TakeQuizzes)?;
            let attempts = load_own_attempts(conn, actor.user_id, quiz_id)?;
            Ok(AttemptSummary {
                best: best_of(&attempts).cloned(),
                remaining_attempts: remaining_attempts(quiz.max_attempts, attempts.len() as i64),
                attempts,
            })
        })
        .await
    }

    pub async fn best_attempt(&self, user_id: Uuid, quiz_id: Uuid) -> Result<Option<QuizAttempt>, ApiError> {
        with_conn(&self.db, move |conn| {
            let attempts = load_own_attempts(conn, user_id, quiz_id)?;
            Ok(best_of(&attempts).cloned())
        })
        .await
    }
}

fn load_own_attempts(
    conn: &mut PgConnection,
    user_id: Uuid,
    quiz_id: Uuid,
) -> Result<Vec<QuizAttempt>, ApiError> {
    Ok(learn_quiz_attempts::table
        .filter(learn_quiz_attempts::quiz_id.eq(quiz_id))
        .filter(learn_quiz_attempts::user_id.eq(user_id))
        .order(learn_quiz_attempts::attempt_number.asc())
        .load(conn)?)
}

// ============================================================================
// HTTP HANDLERS
// ============================================================================

pub async fn list_course_quizzes(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = QuizEngine::new(state.conn.clone());
    Ok(ok_json(engine.list_for_course(&user, course_id).await?))
}

pub async fn create_quiz(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(course_id): Path<Uuid>,
    Json(req): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = QuizEngine::new(state.conn.clone());
    Ok(created_json(engine.create_quiz(&user, course_id, req).await?))
}

pub async fn get_quiz(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(quiz_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = QuizEngine::new(state.conn.clone());
    Ok(ok_json(engine.get_quiz(&user, quiz_id).await?))
}

pub async fn update_quiz(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(quiz_id): Path<Uuid>,
    Json(req): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = QuizEngine::new(state.conn.clone());
    Ok(ok_json(engine.update_quiz(&user, quiz_id, req).await?))
}

pub async fn delete_quiz(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(quiz_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = QuizEngine::new(state.conn.clone());
    engine.delete_quiz(&user, quiz_id).await?;
    Ok(message_json("Quiz deleted"))
}

pub async fn submit_attempt(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(quiz_id): Path<Uuid>,
    Json(submission): Json<QuizSubmission>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = QuizEngine::new(state.conn.clone());
    Ok(created_json(
        engine.submit_attempt(&user, quiz_id, submission).await?,
    ))
}

pub async fn list_attempts(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(quiz_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = QuizEngine::new(state.conn.clone());
    Ok(ok_json(engine.list_attempts(&user, quiz_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(kind: QuestionType, options: &[&str], correct: &[usize], points: i32) -> QuizQuestion {
        QuizQuestion {
            id: Uuid::new_v4(),
            text: "Which?".to_string(),
            question_type: kind,
            options: options.iter().map(|o| o.to_string()).collect(),
            correct_answers: correct.to_vec(),
            points,
            explanation: Some("Because.".to_string()),
        }
    }

    fn attempt(number: i32, percentage: f32) -> QuizAttempt {
        QuizAttempt {
            id: Uuid::new_v4(),
            quiz_id: Uuid::nil(),
            user_id: Uuid::nil(),
            course_id: Uuid::nil(),
            answers: serde_json::json!({}),
            score: 0,
            max_score: 0,
            percentage,
            passed: false,
            time_spent_seconds: 0,
            attempt_number: number,
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn test_score_all_correct() {
        let q1 = question(QuestionType::SingleChoice, &["a", "b"], &[1], 2);
        let q2 = question(QuestionType::MultipleChoice, &["a", "b", "c"], &[0, 2], 3);
        let answers = HashMap::from([
            (q1.id.to_string(), vec![1]),
            (q2.id.to_string(), vec![2, 0]),
        ]);

        let card = score_quiz(&[q1, q2], &answers);
        assert_eq!(card.score, 5);
        assert_eq!(card.max_score, 5);
        assert_eq!(card.percentage, 100.0);
        assert!(card.breakdown.iter().all(|b| b.is_correct));
    }

    #[test]
    fn test_score_ignores_order_and_duplicates() {
        let q = question(QuestionType::MultipleChoice, &["a", "b", "c"], &[0, 2], 1);
        let answers = HashMap::from([(q.id.to_string(), vec![2, 0, 2])]);
        assert_eq!(score_quiz(&[q], &answers).score, 1);
    }

    #[test]
    fn test_score_partial_and_missing() {
        let q1 = question(QuestionType::MultipleChoice, &["a", "b", "c"], &[0, 2], 1);
        let q2 = question(QuestionType::TrueFalse, &["true", "false"], &[0], 1);
        let q3 = question(QuestionType::SingleChoice, &["a", "b"], &[0], 2);
        let answers = HashMap::from([
            (q1.id.to_string(), vec![0]),
            (q2.id.to_string(), vec![0]),
        ]);

        let card = score_quiz(&[q1, q2, q3], &answers);
        assert_eq!(card.score, 1);
        assert_eq!(card.max_score, 4);
        assert_eq!(card.percentage, 25.0);
        assert!(!card.breakdown[0].is_correct);
        assert!(card.breakdown[1].is_correct);
        assert!(card.breakdown[2].user_answers.is_empty());
    }

    #[test]
    fn test_score_zero_total_points() {
        let q = question(QuestionType::SingleChoice, &["a", "b"], &[0], 0);
        let answers = HashMap::from([(q.id.to_string(), vec![0])]);
        let card = score_quiz(&[q], &answers);
        assert_eq!(card.max_score, 0);
        assert_eq!(card.percentage, 0.0);
        assert_eq!(score_quiz(&[], &HashMap::new()).percentage, 0.0);
    }

    #[test]
    fn test_passing_threshold_is_inclusive() {
        assert!(is_passing(70.0, 70));
        assert!(!is_passing(69.9, 70));
        assert!(is_passing(0.0, 0));
    }

    #[test]
    fn test_remaining_attempts() {
        assert_eq!(remaining_attempts(Some(3), 1), Some(2));
        assert_eq!(remaining_attempts(Some(3), 5), Some(0));
        assert_eq!(remaining_attempts(None, 10), None);
    }

    #[test]
    fn test_best_of_prefers_earliest_on_tie() {
        let attempts = vec![attempt(1, 60.0), attempt(2, 80.0), attempt(3, 80.0)];
        assert_eq!(best_of(&attempts).map(|a| a.attempt_number), Some(2));
        assert!(best_of(&[]).is_none());
    }

    #[test]
    fn test_validate_questions() {
        assert!(validate_questions(&[]).is_err());
        assert!(validate_questions(&[question(QuestionType::SingleChoice, &["a", "b"], &[0], 1)]).is_ok());
        assert!(validate_questions(&[question(QuestionType::SingleChoice, &["a", "b"], &[0, 1], 1)]).is_err());
        assert!(validate_questions(&[question(QuestionType::SingleChoice, &["a", "b"], &[2], 1)]).is_err());
        assert!(validate_questions(&[question(QuestionType::MultipleChoice, &[], &[0], 1)]).is_err());
        assert!(validate_questions(&[question(QuestionType::MultipleChoice, &["a", "b"], &[], 1)]).is_err());
        assert!(validate_questions(&[question(QuestionType::TrueFalse, &["t", "f", "x"], &[0], 1)]).is_err());
        assert!(validate_questions(&[question(QuestionType::SingleChoice, &["a"], &[0], -1)]).is_err());
        assert!(validate_questions(&[question(QuestionType::SingleChoice, &["a"], &[0], 0)]).is_ok());
        assert!(validate_questions(&[question(
            QuestionType::SingleChoice,
            &["a"],
            &[0],
            MAX_QUESTION_POINTS
        )])
        .is_ok());

        let q = question(QuestionType::TrueFalse, &["t", "f"], &[1], 1);
        assert!(validate_questions(&[q.clone(), q]).is_err());
    }

    #[test]
    fn test_validate_rejects_points_that_would_overflow_the_total() {
        let questions = vec![
            question(QuestionType::SingleChoice, &["a", "b"], &[0], i32::MAX),
            question(QuestionType::SingleChoice, &["a", "b"], &[1], i32::MAX),
        ];
        assert!(matches!(
            validate_questions(&questions),
            Err(ApiError::Validation(_))
        ));
        assert!(validate_questions(&[question(
            QuestionType::SingleChoice,
            &["a"],
            &[0],
            MAX_QUESTION_POINTS + 1
        )])
        .is_err());

        let many: Vec<QuizQuestion> = (0..=MAX_QUESTIONS)
            .map(|_| question(QuestionType::TrueFalse, &["t", "f"], &[0], 1))
            .collect();
        assert!(validate_questions(&many).is_err());
    }

    #[test]
    fn test_score_saturates_on_oversized_stored_points() {
        let q1 = question(QuestionType::SingleChoice, &["a", "b"], &[0], i32::MAX);
        let q2 = question(QuestionType::SingleChoice, &["a", "b"], &[1], i32::MAX);
        let answers = HashMap::from([
            (q1.id.to_string(), vec![0]),
            (q2.id.to_string(), vec![1]),
        ]);

        let card = score_quiz(&[q1, q2], &answers);
        assert_eq!(card.max_score, i32::MAX);
        assert_eq!(card.score, i32::MAX);
        assert_eq!(card.percentage, 100.0);
    }

    #[test]
    fn test_validate_settings() {
        assert!(validate_settings(DEFAULT_PASSING_SCORE, Some(DEFAULT_MAX_ATTEMPTS), None).is_ok());
        assert!(validate_settings(101, None, None).is_err());
        assert!(validate_settings(-1, None, None).is_err());
        assert!(validate_settings(50, Some(0), None).is_err());
        assert!(validate_settings(50, None, Some(0)).is_err());
    }

    #[test]
    fn test_quiz_view_hides_answers() {
        let q = question(QuestionType::SingleChoice, &["a", "b"], &[1], 4);
        let now = Utc::now();
        let quiz = Quiz {
            id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            module_id: None,
            title: "Check".to_string(),
            description: None,
            questions: serde_json::to_value(vec![q]).unwrap(),
            passing_score: DEFAULT_PASSING_SCORE,
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            time_limit_minutes: None,
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        };

        let view = quiz_view(&quiz).unwrap();
        assert_eq!(view.total_points, 4);
        let json = serde_json::to_string(&QuizPayload::View(view)).unwrap();
        assert!(!json.contains("correct_answers"));
        assert!(!json.contains("explanation"));

        let full = serde_json::to_string(&QuizPayload::Full(quiz)).unwrap();
        assert!(full.contains("correct_answers"));
    }

    #[test]
    fn test_question_input_defaults_points() {
        let input: QuizQuestionInput = serde_json::from_str(
            r#"{"text":"2+2?","question_type":"single_choice","options":["3","4"],"correct_answers":[1]}"#,
        )
        .unwrap();
        let q = input.into_question();
        assert_eq!(q.points, 1);
        assert!(!q.id.is_nil());
    }
}
