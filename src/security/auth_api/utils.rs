use axum::http::{header, HeaderMap};

use super::config::AuthMiddlewareConfig;

/// Bearer header first, then the session cookie.
pub fn extract_token(headers: &HeaderMap, config: &AuthMiddlewareConfig) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix(&config.bearer_prefix))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Some(token.to_string());
    }

    extract_session_from_cookies(headers, &config.session_cookie_name)
}

pub fn extract_session_from_cookies(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|cookies| {
            cookies.split(';').find_map(|cookie| {
                let (name, value) = cookie.trim().split_once('=')?;

                if name == cookie_name && !value.is_empty() {
                    Some(value.to_string())
                } else {
                    None
                }
            })
        })
}

pub fn is_jwt_format(token: &str) -> bool {
    let parts: Vec<&str> = token.split('.').collect();
    parts.len() == 3 && parts.iter().all(|p| !p.is_empty())
}
