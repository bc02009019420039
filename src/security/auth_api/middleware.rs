use super::{
    error::AuthError,
    types::AuthenticatedUser,
    utils::{extract_token, is_jwt_format},
};
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::shared::state::AppState;
use crate::directory::UserDirectory;

/// Resolves the caller for every request.
///
/// Requests without a token continue as anonymous and handlers decide whether that is
/// enough. A presented token must be valid, and the account it names is re-read so that
/// suspensions and role changes apply immediately.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if state.auth_config.is_public_path(&path) {
        request
            .extensions_mut()
            .insert(AuthenticatedUser::anonymous());
        return next.run(request).await;
    }

    let Some(token) = extract_token(request.headers(), &state.auth_config) else {
        request
            .extensions_mut()
            .insert(AuthenticatedUser::anonymous());
        return next.run(request).await;
    };

    match authenticate_token(&state, &token).await {
        Ok(user) => {
            debug!("Authenticated {} as {} for {}", user.user_id, user.role, path);
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => {
            debug!("Rejected token for {}: {:?}", path, e);
            e.into_response()
        }
    }
}

pub async fn authenticate_token(
    state: &AppState,
    token: &str,
) -> Result<AuthenticatedUser, AuthError> {
    if !is_jwt_format(token) {
        return Err(AuthError::InvalidToken);
    }

    let claims = state
        .jwt_manager
        .validate_access_token(token)
        .await
        .map_err(|_| AuthError::InvalidToken)?;
    let user_id = claims.user_id().map_err(|_| AuthError::InvalidToken)?;

    let directory = UserDirectory::new(state.conn.clone());
    let user = directory
        .find(user_id)
        .await
        .map_err(|e| AuthError::InternalError(e.to_string()))?
        .ok_or(AuthError::UserNotFound)?;

    if !user.is_active() {
        warn!("Suspended account {} presented a token", user.id);
        return Err(AuthError::AccountDisabled);
    }

    Ok(
        AuthenticatedUser::new(user.id, user.display_name.clone(), user.auth_role())
            .with_email(user.email)
            .with_token_id(claims.jti),
    )
}
