use axum::{
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    Extension, Json,
};
use log::{info, warn};
use std::sync::Arc;
use tower_cookies::{cookie::SameSite, Cookie, Cookies};

use super::types::{
    AuthResponse, LoginRequest, RefreshRequest, RegisterRequest, UpdateProfileRequest, User,
    UserRole,
};
use super::users::{normalize_email, UserDirectory};
use crate::core::shared::error::ApiError;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{created_json, message_json, ok_json};
use crate::security::auth_api::{extract_token, AuthError, AuthenticatedUser};
use crate::security::jwt::TokenPair;

pub fn session_cookie(state: &AppState, token: &str) -> Cookie<'static> {
    Cookie::build((state.config.auth.cookie_name.clone(), token.to_string()))
        .path("/")
        .http_only(true)
        .secure(state.config.auth.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(state.config.auth.access_token_minutes))
        .build()
}

pub fn expired_session_cookie(state: &AppState) -> Cookie<'static> {
    Cookie::build((state.config.auth.cookie_name.clone(), String::new()))
        .path("/")
        .build()
}

fn issue_tokens(state: &AppState, user: &User) -> Result<TokenPair, ApiError> {
    state
        .jwt_manager
        .generate_token_pair(user.id, &user.email, user.auth_role().as_str())
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Login and registration share one limiter keyed by the normalised email.
fn check_auth_rate_limit(state: &AppState, email: &str) -> Result<(), ApiError> {
    let key = format!("auth:{}", email.trim().to_lowercase());
    if !state.rate_limits.auth_limiter.check(&key) {
        warn!("Rate limit hit for {}", key);
        return Err(AuthError::RateLimited.into());
    }
    Ok(())
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth_rate_limit(&state, &req.email)?;
    let email = normalize_email(&req.email)?;
    let role = if state.config.is_bootstrap_admin(&email) {
        UserRole::Admin
    } else {
        UserRole::Student
    };

    let directory = UserDirectory::new(state.conn.clone());
    let user = directory
        .create(&email, &req.password, &req.display_name, role)
        .await?;
    let tokens = issue_tokens(&state, &user)?;
    cookies.add(session_cookie(&state, &tokens.access_token));

    info!("Registered user {} as {}", user.id, user.role);
    Ok(created_json(AuthResponse { user, tokens }))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth_rate_limit(&state, &req.email)?;

    let directory = UserDirectory::new(state.conn.clone());
    let user = match directory.authenticate(&req.email, &req.password).await {
        Ok(user) => user,
        Err(e) => {
            warn!("Failed login for {}: {}", req.email.trim().to_lowercase(), e);
            return Err(e);
        }
    };
    let tokens = issue_tokens(&state, &user)?;
    cookies.add(session_cookie(&state, &tokens.access_token));

    info!("User {} logged in", user.id);
    Ok(ok_json(AuthResponse { user, tokens }))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = state
        .jwt_manager
        .consume_refresh_token(&req.refresh_token)
        .await
        .map_err(|_| AuthError::InvalidToken)?;
    let user_id = claims.user_id().map_err(|_| AuthError::InvalidToken)?;

    let directory = UserDirectory::new(state.conn.clone());
    let user = directory
        .find(user_id)
        .await?
        .ok_or(AuthError::UserNotFound)?;
    if !user.is_active() {
        return Err(AuthError::AccountDisabled.into());
    }

    let tokens = issue_tokens(&state, &user)?;
    cookies.add(session_cookie(&state, &tokens.access_token));
    Ok(ok_json(AuthResponse { user, tokens }))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    cookies: Cookies,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    user.require_authenticated()?;

    if let Some(token) = extract_token(&headers, &state.auth_config) {
        if let Err(e) = state.jwt_manager.revoke_by_token(&token).await {
            warn!("Could not revoke token on logout: {}", e);
        }
    }
    cookies.remove(expired_session_cookie(&state));

    info!("User {} logged out", user.user_id);
    Ok(message_json("Logged out"))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_authenticated()?;
    let directory = UserDirectory::new(state.conn.clone());
    Ok(ok_json(directory.get(user.user_id).await?))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_authenticated()?;
    let directory = UserDirectory::new(state.conn.clone());
    let updated = directory
        .update_profile(user.user_id, &req.display_name)
        .await?;
    info!("User {} updated their profile", user.user_id);
    Ok(ok_json(updated))
}
