use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::learn::types::EnrollmentRequestDetail;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct QuizStats {
    pub attempts: i64,
    pub passed: i64,
    /// Percentage of passing attempts, one decimal.
    pub pass_rate: f64,
}

impl QuizStats {
    pub fn new(attempts: i64, passed: i64) -> Self {
        let pass_rate = if attempts > 0 {
            (passed as f64 / attempts as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };
        Self {
            attempts,
            passed,
            pass_rate,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminDashboard {
    pub users_by_role: BTreeMap<String, i64>,
    pub users_by_status: BTreeMap<String, i64>,
    pub courses_by_status: BTreeMap<String, i64>,
    pub pending_enrollment_requests: i64,
    pub pending_course_approvals: i64,
    pub total_enrollments: i64,
    pub completions: i64,
    pub quizzes: QuizStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormateurCourseSummary {
    pub id: Uuid,
    pub title: String,
    pub status: String,
    pub student_count: i32,
    pub average_progress: f64,
    pub pending_requests: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormateurDashboard {
    pub courses: Vec<FormateurCourseSummary>,
    pub total_students: i64,
    pub pending_enrollment_requests: i64,
    pub quizzes: QuizStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrolledCourse {
    pub course_id: Uuid,
    pub title: String,
    pub progress: i32,
    pub completed: bool,
    pub last_accessed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentAttempt {
    pub quiz_id: Uuid,
    pub quiz_title: String,
    pub percentage: f32,
    pub passed: bool,
    pub attempt_number: i32,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentDashboard {
    pub enrolled_courses: Vec<EnrolledCourse>,
    pub pending_requests: Vec<EnrollmentRequestDetail>,
    pub denied_requests: Vec<EnrollmentRequestDetail>,
    pub recent_attempts: Vec<RecentAttempt>,
    pub unread_notifications: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RoleDashboard {
    Admin(AdminDashboard),
    Formateur(FormateurDashboard),
    Student(StudentDashboard),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiz_stats_pass_rate() {
        assert_eq!(QuizStats::new(0, 0).pass_rate, 0.0);
        assert_eq!(QuizStats::new(4, 3).pass_rate, 75.0);
        assert_eq!(QuizStats::new(3, 1).pass_rate, 33.3);
    }

    #[test]
    fn test_role_dashboard_is_tagged() {
        let dashboard = RoleDashboard::Formateur(FormateurDashboard {
            courses: vec![],
            total_students: 0,
            pending_enrollment_requests: 2,
            quizzes: QuizStats::default(),
        });
        let json = serde_json::to_value(&dashboard).unwrap();
        assert_eq!(json["role"], "formateur");
        assert_eq!(json["pending_enrollment_requests"], 2);
    }
}
