diesel::table! {
    learn_courses (id) {
        id -> Uuid,
        title -> Text,
        description -> Text,
        category -> Text,
        instructor_id -> Uuid,
        status -> Text,
        modules -> Jsonb,
        student_count -> Int4,
        image_url -> Nullable<Text>,
        rejection_reason -> Nullable<Text>,
        published_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    learn_enrollment_requests (id) {
        id -> Uuid,
        student_id -> Uuid,
        course_id -> Uuid,
        status -> Text,
        message -> Nullable<Text>,
        response_message -> Nullable<Text>,
        responded_by -> Nullable<Uuid>,
        responded_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    learn_progress (id) {
        id -> Uuid,
        user_id -> Uuid,
        course_id -> Uuid,
        progress -> Int4,
        completed -> Bool,
        completed_lessons -> Jsonb,
        started_at -> Timestamptz,
        completed_at -> Nullable<Timestamptz>,
        last_accessed_at -> Timestamptz,
    }
}

diesel::table! {
    learn_quizzes (id) {
        id -> Uuid,
        course_id -> Uuid,
        module_id -> Nullable<Uuid>,
        title -> Text,
        description -> Nullable<Text>,
        questions -> Jsonb,
        passing_score -> Int4,
        max_attempts -> Nullable<Int4>,
        time_limit_minutes -> Nullable<Int4>,
        created_by -> Uuid,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    learn_quiz_attempts (id) {
        id -> Uuid,
        quiz_id -> Uuid,
        user_id -> Uuid,
        course_id -> Uuid,
        answers -> Jsonb,
        score -> Int4,
        max_score -> Int4,
        percentage -> Float4,
        passed -> Bool,
        time_spent_seconds -> Int4,
        attempt_number -> Int4,
        submitted_at -> Timestamptz,
    }
}
