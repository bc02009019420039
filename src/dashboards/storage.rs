use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::PgConnection;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use super::types::{
    AdminDashboard, EnrolledCourse, FormateurCourseSummary, FormateurDashboard, QuizStats,
    RecentAttempt,
};
use crate::core::shared::schema::{
    learn_courses, learn_enrollment_requests, learn_progress, learn_quiz_attempts, learn_quizzes,
    users,
};
use crate::learn::types::{CourseStatus, EnrollmentStatus, Progress, QuizAttempt};

pub const RECENT_ATTEMPTS: i64 = 5;

pub fn tally(rows: Vec<(String, i64)>) -> BTreeMap<String, i64> {
    let mut out = BTreeMap::new();
    for (key, count) in rows {
        *out.entry(key).or_insert(0) += count;
    }
    out
}

/// Mean of the progress values, one decimal; 0 when nobody is enrolled.
pub fn average_progress(values: &[i32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: i64 = values.iter().map(|v| *v as i64).sum();
    (sum as f64 / values.len() as f64 * 10.0).round() / 10.0
}

fn quiz_stats(conn: &mut PgConnection, course_ids: Option<&[Uuid]>) -> QueryResult<QuizStats> {
    let mut attempts = learn_quiz_attempts::table.into_boxed();
    let mut passed = learn_quiz_attempts::table
        .filter(learn_quiz_attempts::passed.eq(true))
        .into_boxed();
    if let Some(ids) = course_ids {
        attempts = attempts.filter(learn_quiz_attempts::course_id.eq_any(ids.to_vec()));
        passed = passed.filter(learn_quiz_attempts::course_id.eq_any(ids.to_vec()));
    }

    let attempts: i64 = attempts.count().get_result(conn)?;
    let passed: i64 = passed.count().get_result(conn)?;
    Ok(QuizStats::new(attempts, passed))
}

pub fn load_admin_dashboard(conn: &mut PgConnection) -> QueryResult<AdminDashboard> {
    let users_by_role = users::table
        .group_by(users::role)
        .select((users::role, count_star()))
        .load::<(String, i64)>(conn)?;
    let users_by_status = users::table
        .group_by(users::status)
        .select((users::status, count_star()))
        .load::<(String, i64)>(conn)?;
    let courses_by_status = learn_courses::table
        .group_by(learn_courses::status)
        .select((learn_courses::status, count_star()))
        .load::<(String, i64)>(conn)?;

    let pending_enrollment_requests = learn_enrollment_requests::table
        .filter(learn_enrollment_requests::status.eq(EnrollmentStatus::Pending.as_str()))
        .count()
        .get_result(conn)?;
    let pending_course_approvals = learn_courses::table
        .filter(learn_courses::status.eq(CourseStatus::PendingApproval.as_str()))
        .count()
        .get_result(conn)?;
    let total_enrollments = learn_progress::table.count().get_result(conn)?;
    let completions = learn_progress::table
        .filter(learn_progress::completed.eq(true))
        .count()
        .get_result(conn)?;

    Ok(AdminDashboard {
        users_by_role: tally(users_by_role),
        users_by_status: tally(users_by_status),
        courses_by_status: tally(courses_by_status),
        pending_enrollment_requests,
        pending_course_approvals,
        total_enrollments,
        completions,
        quizzes: quiz_stats(conn, None)?,
    })
}

pub fn load_formateur_dashboard(
    conn: &mut PgConnection,
    instructor_id: Uuid,
) -> QueryResult<FormateurDashboard> {
    let courses = learn_courses::table
        .filter(learn_courses::instructor_id.eq(instructor_id))
        .order(learn_courses::updated_at.desc())
        .select((
            learn_courses::id,
            learn_courses::title,
            learn_courses::status,
            learn_courses::student_count,
        ))
        .load::<(Uuid, String, String, i32)>(conn)?;
    let course_ids: Vec<Uuid> = courses.iter().map(|c| c.0).collect();

    let mut progress_by_course: HashMap<Uuid, Vec<i32>> = HashMap::new();
    for (course_id, progress) in learn_progress::table
        .filter(learn_progress::course_id.eq_any(course_ids.clone()))
        .select((learn_progress::course_id, learn_progress::progress))
        .load::<(Uuid, i32)>(conn)?
    {
        progress_by_course.entry(course_id).or_default().push(progress);
    }

    let mut pending_by_course: HashMap<Uuid, i64> = HashMap::new();
    for course_id in learn_enrollment_requests::table
        .filter(learn_enrollment_requests::course_id.eq_any(course_ids.clone()))
        .filter(learn_enrollment_requests::status.eq(EnrollmentStatus::Pending.as_str()))
        .select(learn_enrollment_requests::course_id)
        .load::<Uuid>(conn)?
    {
        *pending_by_course.entry(course_id).or_insert(0) += 1;
    }

    let total_students = progress_by_course.values().map(|v| v.len() as i64).sum();
    let pending_enrollment_requests = pending_by_course.values().sum();

    let courses = courses
        .into_iter()
        .map(|(id, title, status, student_count)| FormateurCourseSummary {
            average_progress: progress_by_course
                .get(&id)
                .map(|values| average_progress(values))
                .unwrap_or(0.0),
            pending_requests: pending_by_course.get(&id).copied().unwrap_or(0),
            id,
            title,
            status,
            student_count,
        })
        .collect();

    Ok(FormateurDashboard {
        courses,
        total_students,
        pending_enrollment_requests,
        quizzes: quiz_stats(conn, Some(&course_ids))?,
    })
}

pub fn load_enrolled_courses(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> QueryResult<Vec<EnrolledCourse>> {
    let rows = learn_progress::table
        .inner_join(learn_courses::table)
        .filter(learn_progress::user_id.eq(user_id))
        .order(learn_progress::last_accessed_at.desc())
        .select((Progress::as_select(), learn_courses::title))
        .load::<(Progress, String)>(conn)?;

    Ok(rows
        .into_iter()
        .map(|(p, title)| EnrolledCourse {
            course_id: p.course_id,
            title,
            progress: p.progress,
            completed: p.completed,
            last_accessed_at: p.last_accessed_at,
        })
        .collect())
}

pub fn load_recent_attempts(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> QueryResult<Vec<RecentAttempt>> {
    let rows = learn_quiz_attempts::table
        .inner_join(learn_quizzes::table)
        .filter(learn_quiz_attempts::user_id.eq(user_id))
        .order(learn_quiz_attempts::submitted_at.desc())
        .limit(RECENT_ATTEMPTS)
        .select((QuizAttempt::as_select(), learn_quizzes::title))
        .load::<(QuizAttempt, String)>(conn)?;

    Ok(rows
        .into_iter()
        .map(|(a, quiz_title)| RecentAttempt {
            quiz_id: a.quiz_id,
            quiz_title,
            percentage: a.percentage,
            passed: a.passed,
            attempt_number: a.attempt_number,
            submitted_at: a.submitted_at,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_merges_keys() {
        let counts = tally(vec![
            ("student".to_string(), 3),
            ("admin".to_string(), 1),
            ("student".to_string(), 2),
        ]);
        assert_eq!(counts.get("student"), Some(&5));
        assert_eq!(counts.get("admin"), Some(&1));
        assert_eq!(counts.keys().next().map(String::as_str), Some("admin"));
    }

    #[test]
    fn test_average_progress() {
        assert_eq!(average_progress(&[]), 0.0);
        assert_eq!(average_progress(&[100, 50]), 75.0);
        assert_eq!(average_progress(&[10, 20, 20]), 16.7);
    }
}
