#[cfg(test)]
mod tests {
    use super::super::types::*;
    use super::super::*;
    use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
    use uuid::Uuid;

    #[test]
    fn test_role_permissions() {
        assert!(Role::Anonymous.has_permission(&Permission::ViewCatalog));
        assert!(!Role::Anonymous.has_permission(&Permission::RequestEnrollment));

        assert!(Role::Student.has_permission(&Permission::RequestEnrollment));
        assert!(Role::Student.has_permission(&Permission::TakeQuizzes));
        assert!(!Role::Student.has_permission(&Permission::ManageOwnCourses));

        assert!(Role::Formateur.has_permission(&Permission::ManageOwnCourses));
        assert!(Role::Formateur.has_permission(&Permission::ReviewEnrollments));
        assert!(!Role::Formateur.has_permission(&Permission::ApproveCourses));

        assert!(Role::Admin.has_permission(&Permission::ApproveCourses));
        assert!(Role::Admin.has_permission(&Permission::ReviewEnrollments));
        assert!(Role::Admin.has_permission(&Permission::BroadcastNotifications));
    }

    #[test]
    fn test_role_hierarchy() {
        assert!(Role::Admin.is_at_least(&Role::Formateur));
        assert!(Role::Formateur.is_at_least(&Role::Student));
        assert!(!Role::Student.is_at_least(&Role::Formateur));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("ADMIN".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("instructor".parse::<Role>(), Ok(Role::Formateur));
        assert_eq!("nobody".parse::<Role>(), Ok(Role::Anonymous));
        assert_eq!(Role::Formateur.to_string(), "formateur");
    }

    #[test]
    fn test_authenticated_user_builder() {
        let id = Uuid::new_v4();
        let user = AuthenticatedUser::new(id, "Ada", Role::Student)
            .with_email("ada@example.com")
            .with_token_id("jti-1");

        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
        assert_eq!(user.token_id.as_deref(), Some("jti-1"));
        assert!(user.is_authenticated());
        assert!(user.is_student());
    }

    #[test]
    fn test_anonymous_user() {
        let user = AuthenticatedUser::anonymous();
        assert!(!user.is_authenticated());
        assert!(user.has_permission(&Permission::ViewCatalog));
    }

    #[test]
    fn test_require_distinguishes_401_and_403() {
        let anon = AuthenticatedUser::anonymous();
        let err = anon.require(&Permission::TakeQuizzes).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let student = AuthenticatedUser::new(Uuid::new_v4(), "s", Role::Student);
        let err = student.require(&Permission::ApproveCourses).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        assert!(student.require(&Permission::TakeQuizzes).is_ok());
    }

    #[test]
    fn test_can_manage() {
        let owner = Uuid::new_v4();
        let formateur = AuthenticatedUser::new(owner, "f", Role::Formateur);
        let other = AuthenticatedUser::new(Uuid::new_v4(), "g", Role::Formateur);
        let admin = AuthenticatedUser::new(Uuid::new_v4(), "a", Role::Admin);
        let student = AuthenticatedUser::new(owner, "s", Role::Student);

        assert!(formateur.can_manage(&owner));
        assert!(!other.can_manage(&owner));
        assert!(admin.can_manage(&owner));
        assert!(!student.can_manage(&owner));
    }

    #[test]
    fn test_extract_token_prefers_bearer() {
        let config = AuthMiddlewareConfig::default();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer header.token.value"),
        );
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("learn_session=cookie.token.value"),
        );

        assert_eq!(
            extract_token(&headers, &config).as_deref(),
            Some("header.token.value")
        );
    }

    #[test]
    fn test_extract_token_falls_back_to_cookie() {
        let config = AuthMiddlewareConfig::default();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; learn_session=a.b.c; lang=fr"),
        );

        assert_eq!(extract_token(&headers, &config).as_deref(), Some("a.b.c"));
        assert_eq!(
            extract_session_from_cookies(&headers, "theme").as_deref(),
            Some("dark")
        );
        assert!(extract_session_from_cookies(&headers, "missing").is_none());
    }

    #[test]
    fn test_extract_token_ignores_empty_bearer() {
        let config = AuthMiddlewareConfig::default();
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));

        assert!(extract_token(&headers, &config).is_none());
    }

    #[test]
    fn test_is_jwt_format() {
        assert!(is_jwt_format("aaa.bbb.ccc"));
        assert!(!is_jwt_format("aaa.bbb"));
        assert!(!is_jwt_format("aaa..ccc"));
        assert!(!is_jwt_format("opaque-session-id"));
    }

    #[test]
    fn test_public_paths() {
        let config = AuthMiddlewareConfig::default();
        assert!(config.is_public_path("/health"));
        assert!(config.is_public_path("/api/auth/login"));
        assert!(config.is_public_path("/api/auth/register"));
        assert!(!config.is_public_path("/api/auth/me"));
        assert!(!config.is_public_path("/api/courses"));
    }

    #[test]
    fn test_auth_error_codes() {
        assert_eq!(AuthError::MissingToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::AccountDisabled.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthError::RateLimited.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}
