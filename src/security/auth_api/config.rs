use crate::core::urls::ApiUrls;

/// Settings the auth middleware needs per request.
#[derive(Debug, Clone)]
pub struct AuthMiddlewareConfig {
    pub bearer_prefix: String,
    pub session_cookie_name: String,
    pub public_paths: Vec<String>,
}

impl Default for AuthMiddlewareConfig {
    fn default() -> Self {
        Self {
            bearer_prefix: "Bearer ".to_string(),
            session_cookie_name: "learn_session".to_string(),
            public_paths: ApiUrls::PUBLIC_PATHS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl AuthMiddlewareConfig {
    pub fn new(session_cookie_name: impl Into<String>) -> Self {
        Self {
            session_cookie_name: session_cookie_name.into(),
            ..Self::default()
        }
    }

    /// Public paths skip token processing entirely, so a stale cookie cannot block login.
    pub fn is_public_path(&self, path: &str) -> bool {
        self.public_paths
            .iter()
            .any(|public_path| path == public_path || path.starts_with(&format!("{}/", public_path)))
    }
}
