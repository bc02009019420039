use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<Method>,
    pub allowed_headers: Vec<header::HeaderName>,
    pub exposed_headers: Vec<header::HeaderName>,
    pub allow_credentials: bool,
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allowed_methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ],
            allowed_headers: vec![
                header::AUTHORIZATION,
                header::CONTENT_TYPE,
                header::ACCEPT,
                header::HeaderName::from_static("x-request-id"),
            ],
            exposed_headers: vec![header::HeaderName::from_static("x-request-id")],
            allow_credentials: true,
            max_age_secs: 3600,
        }
    }
}

impl CorsConfig {
    pub fn with_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = origins;
        self
    }

    /// `"*"` mirrors the request origin so cookies keep working; otherwise only listed
    /// origins are allowed. Unparsable entries are skipped.
    pub fn build(self) -> CorsLayer {
        let allow_origin = if self.allowed_origins.iter().any(|o| o == "*") {
            warn!("CORS configured to accept any origin");
            AllowOrigin::mirror_request()
        } else {
            let origins: Vec<HeaderValue> = self
                .allowed_origins
                .iter()
                .filter_map(|o| match o.parse() {
                    Ok(value) if is_valid_origin_format(o) => Some(value),
                    _ => {
                        warn!("Ignoring invalid CORS origin {o}");
                        None
                    }
                })
                .collect();
            info!("CORS allowed origins: {:?}", origins);
            AllowOrigin::list(origins)
        };

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(self.allowed_methods)
            .allow_headers(self.allowed_headers)
            .expose_headers(self.exposed_headers)
            .allow_credentials(self.allow_credentials)
            .max_age(std::time::Duration::from_secs(self.max_age_secs))
    }
}

pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    CorsConfig::default().with_origins(origins.to_vec()).build()
}

fn is_valid_origin_format(origin: &str) -> bool {
    let Some(rest) = origin
        .strip_prefix("https://")
        .or_else(|| origin.strip_prefix("http://"))
    else {
        return false;
    };
    !rest.is_empty() && !rest.contains('/') && !rest.contains(' ')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_origin_format() {
        assert!(is_valid_origin_format("https://learn.example.com"));
        assert!(is_valid_origin_format("http://localhost:3000"));
        assert!(!is_valid_origin_format("learn.example.com"));
        assert!(!is_valid_origin_format("https://learn.example.com/path"));
        assert!(!is_valid_origin_format("https://"));
    }

    #[test]
    fn test_build_cors_layer() {
        let _layer = create_cors_layer(&["http://localhost:3000".to_string()]);
        let _wildcard = create_cors_layer(&["*".to_string()]);
        let _empty = create_cors_layer(&[]);
    }
}
