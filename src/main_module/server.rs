//! HTTP server initialization and routing

use axum::{routing::get, Router};
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tower_cookies::CookieManagerLayer;
use tower_http::trace::TraceLayer;

use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;
use crate::dashboards::configure_dashboards_routes;
use crate::learn::configure_learn_routes;
use crate::notifications::configure_notification_routes;
use crate::security::{auth_middleware, create_cors_layer, request_id_middleware};

use super::{health_check, health_check_simple, shutdown_signal};

const REVOCATION_SWEEP_SECS: u64 = 600;

/// Every route plus the middleware stack, bound to `state`.
pub fn build_router(state: Arc<AppState>) -> Router {
    let mut api_router = Router::new()
        .route(ApiUrls::HEALTH, get(health_check_simple))
        .route(ApiUrls::API_HEALTH, get(health_check))
        .merge(crate::directory::configure())
        .merge(configure_learn_routes())
        .merge(configure_notification_routes())
        .merge(configure_dashboards_routes());

    #[cfg(feature = "llm")]
    {
        api_router = api_router.merge(crate::assistant::configure_assistant_routes());
    }

    #[cfg(feature = "media")]
    {
        api_router = api_router.merge(crate::media::configure_media_routes(
            state.config.media.max_image_bytes,
        ));
    }

    let cors = create_cors_layer(&state.config.server.cors_origins);

    // Last added runs first: trace, CORS, cookies, request id, then auth.
    api_router
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(CookieManagerLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_axum_server(app_state: Arc<AppState>) -> std::io::Result<()> {
    let addr = app_state.config.bind_address();

    #[cfg(feature = "llm")]
    if app_state.llm_provider.is_none() {
        info!("No [llm] section configured, the assistant answers 503");
    }
    #[cfg(feature = "media")]
    if app_state.media.is_none() {
        info!("No [cloudinary] section configured, image uploads answer 503");
    }

    let jwt_manager = app_state.jwt_manager.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(REVOCATION_SWEEP_SECS));
        loop {
            interval.tick().await;
            jwt_manager.cleanup_blacklist().await;
        }
    });

    let app = build_router(app_state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(
                "Failed to bind to {}: {} - is another instance running?",
                addr, e
            );
            return Err(e);
        }
    };
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(std::io::Error::other)
}
