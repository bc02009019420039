pub mod platform;
pub mod learn;

pub use self::platform::*;
pub use self::learn::*;

diesel::joinable!(learn_courses -> users (instructor_id));
diesel::joinable!(learn_enrollment_requests -> learn_courses (course_id));
diesel::joinable!(learn_progress -> learn_courses (course_id));
diesel::joinable!(learn_quizzes -> learn_courses (course_id));
diesel::joinable!(learn_quiz_attempts -> learn_quizzes (quiz_id));
diesel::joinable!(notifications -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    notifications,
    learn_courses,
    learn_enrollment_requests,
    learn_progress,
    learn_quizzes,
    learn_quiz_attempts,
);
