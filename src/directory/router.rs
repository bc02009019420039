use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

use super::auth_routes;
use super::users;

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::AUTH_REGISTER, post(auth_routes::register))
        .route(ApiUrls::AUTH_LOGIN, post(auth_routes::login))
        .route(ApiUrls::AUTH_REFRESH, post(auth_routes::refresh))
        .route(ApiUrls::AUTH_LOGOUT, post(auth_routes::logout))
        .route(
            ApiUrls::AUTH_ME,
            get(auth_routes::me).put(auth_routes::update_profile),
        )
        .route(ApiUrls::USERS, get(users::list_users).post(users::create_user))
        .route(
            ApiUrls::USER_BY_ID,
            get(users::get_user).delete(users::delete_user),
        )
        .route(ApiUrls::USER_ROLE, put(users::update_user_role))
        .route(ApiUrls::USER_STATUS, put(users::update_user_status))
}
