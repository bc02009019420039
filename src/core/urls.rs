#[derive(Debug)]
pub struct ApiUrls;

impl ApiUrls {
    // Health
    pub const HEALTH: &'static str = "/health";
    pub const API_HEALTH: &'static str = "/api/health";

    // Auth - JSON APIs
    pub const AUTH_REGISTER: &'static str = "/api/auth/register";
    pub const AUTH_LOGIN: &'static str = "/api/auth/login";
    pub const AUTH_REFRESH: &'static str = "/api/auth/refresh";
    pub const AUTH_LOGOUT: &'static str = "/api/auth/logout";
    pub const AUTH_ME: &'static str = "/api/auth/me";

    // User management - JSON APIs
    pub const USERS: &'static str = "/api/users";
    pub const USER_BY_ID: &'static str = "/api/users/:id";
    pub const USER_ROLE: &'static str = "/api/users/:id/role";
    pub const USER_STATUS: &'static str = "/api/users/:id/status";

    // Courses - JSON APIs
    pub const COURSES: &'static str = "/api/courses";
    pub const COURSES_MINE: &'static str = "/api/courses/mine";
    pub const COURSES_ADMIN: &'static str = "/api/courses/admin";
    pub const COURSE_BY_ID: &'static str = "/api/courses/:id";
    pub const COURSE_MODULES: &'static str = "/api/courses/:id/modules";
    pub const COURSE_MODULE_BY_ID: &'static str = "/api/courses/:id/modules/:module_id";
    pub const COURSE_LESSONS: &'static str = "/api/courses/:id/modules/:module_id/lessons";
    pub const COURSE_LESSON_BY_ID: &'static str =
        "/api/courses/:id/modules/:module_id/lessons/:lesson_id";
    pub const COURSE_SUBMIT: &'static str = "/api/courses/:id/submit";
    pub const COURSE_REVIEW: &'static str = "/api/courses/:id/review";
    pub const COURSE_UNPUBLISH: &'static str = "/api/courses/:id/unpublish";
    pub const COURSE_IMAGE: &'static str = "/api/courses/:id/image";
    pub const COURSE_PROGRESS: &'static str = "/api/courses/:id/progress";
    pub const COURSE_ENROLLMENTS: &'static str = "/api/courses/:id/enrollments";
    pub const COURSE_QUIZZES: &'static str = "/api/courses/:id/quizzes";

    // Enrollment requests - JSON APIs
    pub const ENROLLMENTS: &'static str = "/api/enrollments";
    pub const ENROLLMENTS_PENDING: &'static str = "/api/enrollments/pending";
    pub const ENROLLMENT_BY_ID: &'static str = "/api/enrollments/:id";
    pub const ENROLLMENT_RESPOND: &'static str = "/api/enrollments/:id/respond";

    // Progress - JSON APIs
    pub const PROGRESS: &'static str = "/api/progress";
    pub const PROGRESS_BY_COURSE: &'static str = "/api/progress/:course_id";
    pub const PROGRESS_LESSON: &'static str = "/api/progress/:course_id/lessons/:lesson_id";

    // Quizzes - JSON APIs
    pub const QUIZ_BY_ID: &'static str = "/api/quizzes/:id";
    pub const QUIZ_ATTEMPTS: &'static str = "/api/quizzes/:id/attempts";

    // Notifications - JSON APIs
    pub const NOTIFICATIONS: &'static str = "/api/notifications";
    pub const NOTIFICATIONS_UNREAD_COUNT: &'static str = "/api/notifications/unread-count";
    pub const NOTIFICATIONS_READ_ALL: &'static str = "/api/notifications/read-all";
    pub const NOTIFICATIONS_BROADCAST: &'static str = "/api/notifications/broadcast";
    pub const NOTIFICATION_READ: &'static str = "/api/notifications/:id/read";
    pub const NOTIFICATION_BY_ID: &'static str = "/api/notifications/:id";

    // Dashboards - JSON APIs
    pub const DASHBOARD: &'static str = "/api/dashboard";
    pub const DASHBOARD_ADMIN: &'static str = "/api/dashboard/admin";
    pub const DASHBOARD_FORMATEUR: &'static str = "/api/dashboard/formateur";
    pub const DASHBOARD_STUDENT: &'static str = "/api/dashboard/student";

    // Assistant - JSON APIs
    pub const ASSISTANT_CHAT: &'static str = "/api/assistant/chat";

    // Media - JSON APIs
    pub const MEDIA_IMAGES: &'static str = "/api/media/images";
    pub const MEDIA_IMAGE_BY_ID: &'static str = "/api/media/images/*public_id";
}

impl ApiUrls {
    /// Paths reachable without a token.
    pub const PUBLIC_PATHS: &'static [&'static str] = &[
        Self::HEALTH,
        Self::API_HEALTH,
        Self::AUTH_REGISTER,
        Self::AUTH_LOGIN,
        Self::AUTH_REFRESH,
    ];

    pub fn with_params(url: &str, params: &[(&str, &str)]) -> String {
        let mut result = url.to_string();
        for (key, value) in params {
            result = result.replace(&format!(":{key}"), value);
        }
        result
    }

    pub fn course(id: impl std::fmt::Display) -> String {
        Self::with_params(Self::COURSE_BY_ID, &[("id", &id.to_string())])
    }

    pub fn enrollment(id: impl std::fmt::Display) -> String {
        Self::with_params(Self::ENROLLMENT_BY_ID, &[("id", &id.to_string())])
    }

    pub fn quiz(id: impl std::fmt::Display) -> String {
        Self::with_params(Self::QUIZ_BY_ID, &[("id", &id.to_string())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_params() {
        assert_eq!(
            ApiUrls::with_params(
                ApiUrls::COURSE_LESSON_BY_ID,
                &[("id", "c1"), ("module_id", "m1"), ("lesson_id", "l1")]
            ),
            "/api/courses/c1/modules/m1/lessons/l1"
        );
        assert_eq!(ApiUrls::enrollment("abc"), "/api/enrollments/abc");
    }
}
