//! Types for the Learn module
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::core::shared::error::ApiError;
use crate::core::shared::schema::learn::*;

pub const DEFAULT_PASSING_SCORE: i32 = 70;
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

// ============================================================================
// COURSES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    Draft,
    PendingApproval,
    Published,
    Rejected,
}

impl CourseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingApproval => "pending_approval",
            Self::Published => "published",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "pending_approval" => Some(Self::PendingApproval),
            "published" => Some(Self::Published),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: CourseStatus) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::PendingApproval)
                | (Self::Rejected, Self::PendingApproval)
                | (Self::PendingApproval, Self::Published)
                | (Self::PendingApproval, Self::Rejected)
                | (Self::Published, Self::Draft)
        )
    }
}

impl std::fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default)]
    pub duration_minutes: i32,
    #[serde(default)]
    pub video_url: Option<String>,
}

fn default_content_type() -> String {
    "text".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseModule {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Identifiable, Serialize)]
#[diesel(table_name = learn_courses)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub instructor_id: Uuid,
    pub status: String,
    pub modules: serde_json::Value,
    pub student_count: i32,
    pub image_url: Option<String>,
    pub rejection_reason: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    /// Stored statuses outside the known set are treated as drafts.
    pub fn course_status(&self) -> CourseStatus {
        CourseStatus::parse(&self.status).unwrap_or(CourseStatus::Draft)
    }

    pub fn is_published(&self) -> bool {
        self.course_status() == CourseStatus::Published
    }

    pub fn module_list(&self) -> Result<Vec<CourseModule>, ApiError> {
        Ok(serde_json::from_value(self.modules.clone())?)
    }

    pub fn lesson_ids(&self) -> Result<Vec<Uuid>, ApiError> {
        Ok(self
            .module_list()?
            .iter()
            .flat_map(|m| m.lessons.iter().map(|l| l.id))
            .collect())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LessonInput {
    pub id: Option<Uuid>,
    pub title: String,
    pub content: Option<String>,
    pub content_type: Option<String>,
    pub duration_minutes: Option<i32>,
    pub video_url: Option<String>,
}

impl LessonInput {
    pub fn into_lesson(self) -> Lesson {
        Lesson {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            title: self.title.trim().to_string(),
            content: self.content,
            content_type: self.content_type.unwrap_or_else(default_content_type),
            duration_minutes: self.duration_minutes.unwrap_or(0).max(0),
            video_url: self.video_url,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModuleInput {
    pub id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub lessons: Vec<LessonInput>,
}

impl ModuleInput {
    pub fn into_module(self) -> CourseModule {
        CourseModule {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            title: self.title.trim().to_string(),
            lessons: self.lessons.into_iter().map(LessonInput::into_lesson).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCourseRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: Option<String>,
    pub modules: Option<Vec<ModuleInput>>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCourseRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub modules: Option<Vec<ModuleInput>>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewCourseRequest {
    pub approve: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourseFilters {
    pub category: Option<String>,
    pub search: Option<String>,
    pub status: Option<CourseStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ============================================================================
// ENROLLMENT REQUESTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Pending,
    Approved,
    Denied,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "denied" => Some(Self::Denied),
            _ => None,
        }
    }
}

impl std::fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Identifiable, Serialize)]
#[diesel(table_name = learn_enrollment_requests)]
pub struct EnrollmentRequest {
    pub id: Uuid,
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub status: String,
    pub message: Option<String>,
    pub response_message: Option<String>,
    pub responded_by: Option<Uuid>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EnrollmentRequest {
    pub fn is_pending(&self) -> bool {
        EnrollmentStatus::parse(&self.status) == Some(EnrollmentStatus::Pending)
    }
}

/// A request joined with the names a reviewer needs to act on it.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentRequestDetail {
    #[serde(flatten)]
    pub request: EnrollmentRequest,
    pub course_title: String,
    pub student_name: String,
    pub student_email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEnrollmentRequest {
    pub course_id: Uuid,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RespondEnrollmentRequest {
    pub approve: bool,
    pub response_message: Option<String>,
}

// ============================================================================
// PROGRESS
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Identifiable, Serialize)]
#[diesel(table_name = learn_progress)]
pub struct Progress {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub progress: i32,
    pub completed: bool,
    pub completed_lessons: serde_json::Value,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_accessed_at: DateTime<Utc>,
}

impl Progress {
    pub fn new(user_id: Uuid, course_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            course_id,
            progress: 0,
            completed: false,
            completed_lessons: serde_json::json!([]),
            started_at: now,
            completed_at: None,
            last_accessed_at: now,
        }
    }

    pub fn lesson_list(&self) -> Vec<Uuid> {
        serde_json::from_value(self.completed_lessons.clone()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressDetail {
    #[serde(flatten)]
    pub progress: Progress,
    pub course_title: String,
    pub total_lessons: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentProgress {
    #[serde(flatten)]
    pub progress: Progress,
    pub student_name: String,
    pub student_email: String,
}

// ============================================================================
// QUIZZES
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    TrueFalse,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizQuestion {
    pub id: Uuid,
    pub text: String,
    pub question_type: QuestionType,
    pub options: Vec<String>,
    pub correct_answers: Vec<usize>,
    #[serde(default = "default_points")]
    pub points: i32,
    #[serde(default)]
    pub explanation: Option<String>,
}

fn default_points() -> i32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuizQuestionInput {
    pub id: Option<Uuid>,
    pub text: String,
    pub question_type: QuestionType,
    pub options: Vec<String>,
    pub correct_answers: Vec<usize>,
    pub points: Option<i32>,
    pub explanation: Option<String>,
}

impl QuizQuestionInput {
    pub fn into_question(self) -> QuizQuestion {
        QuizQuestion {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            text: self.text.trim().to_string(),
            question_type: self.question_type,
            options: self.options,
            correct_answers: self.correct_answers,
            points: self.points.unwrap_or_else(default_points),
            explanation: self.explanation,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Identifiable, Serialize)]
#[diesel(table_name = learn_quizzes)]
pub struct Quiz {
    pub id: Uuid,
    pub course_id: Uuid,
    pub module_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub questions: serde_json::Value,
    pub passing_score: i32,
    pub max_attempts: Option<i32>,
    pub time_limit_minutes: Option<i32>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quiz {
    pub fn question_list(&self) -> Result<Vec<QuizQuestion>, ApiError> {
        Ok(serde_json::from_value(self.questions.clone())?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateQuizRequest {
    pub module_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<QuizQuestionInput>,
    pub passing_score: Option<i32>,
    pub max_attempts: Option<i32>,
    pub time_limit_minutes: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateQuizRequest {
    pub module_id: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub questions: Option<Vec<QuizQuestionInput>>,
    pub passing_score: Option<i32>,
    pub max_attempts: Option<i32>,
    pub time_limit_minutes: Option<i32>,
}

/// Question as shown to someone taking the quiz.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub id: Uuid,
    pub text: String,
    pub question_type: QuestionType,
    pub options: Vec<String>,
    pub points: i32,
}

impl From<&QuizQuestion> for QuestionView {
    fn from(q: &QuizQuestion) -> Self {
        Self {
            id: q.id,
            text: q.text.clone(),
            question_type: q.question_type,
            options: q.options.clone(),
            points: q.points,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizView {
    pub id: Uuid,
    pub course_id: Uuid,
    pub module_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<QuestionView>,
    pub passing_score: i32,
    pub max_attempts: Option<i32>,
    pub time_limit_minutes: Option<i32>,
    pub total_points: i32,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Identifiable, Serialize)]
#[diesel(table_name = learn_quiz_attempts)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub answers: serde_json::Value,
    pub score: i32,
    pub max_score: i32,
    pub percentage: f32,
    pub passed: bool,
    pub time_spent_seconds: i32,
    pub attempt_number: i32,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSubmission {
    /// Selected option indices keyed by question id.
    pub answers: HashMap<String, Vec<usize>>,
    #[serde(default)]
    pub time_spent_seconds: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerResult {
    pub question_id: Uuid,
    pub is_correct: bool,
    pub points_earned: i32,
    pub correct_answers: Vec<usize>,
    pub user_answers: Vec<usize>,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizResult {
    pub attempt_id: Uuid,
    pub quiz_id: Uuid,
    pub score: i32,
    pub max_score: i32,
    pub percentage: f32,
    pub passed: bool,
    pub attempt_number: i32,
    pub remaining_attempts: Option<i32>,
    pub answers_breakdown: Vec<AnswerResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptSummary {
    pub attempts: Vec<QuizAttempt>,
    pub best: Option<QuizAttempt>,
    pub remaining_attempts: Option<i32>,
}
