use crate::core::config::AppConfig;
use crate::core::rate_limit::RateLimitState;
#[cfg(feature = "llm")]
use crate::llm::{LLMProvider, OpenAIClient};
#[cfg(feature = "media")]
use crate::media::CloudinaryClient;
use crate::security::auth_api::AuthMiddlewareConfig;
use crate::security::jwt::JwtManager;
use crate::core::shared::utils::DbPool;
use anyhow::Result;
use std::sync::Arc;

pub struct AppState {
    pub conn: DbPool,
    pub config: Arc<AppConfig>,
    pub jwt_manager: Arc<JwtManager>,
    pub auth_config: AuthMiddlewareConfig,
    pub rate_limits: Arc<RateLimitState>,
    #[cfg(feature = "llm")]
    pub llm_provider: Option<Arc<dyn LLMProvider>>,
    #[cfg(feature = "media")]
    pub media: Option<Arc<CloudinaryClient>>,
}

impl AppState {
    /// Wires every shared service from the loaded configuration.
    ///
    /// Optional integrations (LLM, Cloudinary) stay `None` when their section is absent;
    /// the endpoints depending on them answer 503.
    pub fn new(config: AppConfig, conn: DbPool) -> Result<Self> {
        let jwt_manager = JwtManager::from_auth_config(&config.auth)?;
        let auth_config = AuthMiddlewareConfig::new(config.auth.cookie_name.clone());
        let rate_limits = RateLimitState::new(&config.rate_limit);

        #[cfg(feature = "llm")]
        let llm_provider = config.llm.as_ref().map(|llm| {
            Arc::new(OpenAIClient::from_config(llm)) as Arc<dyn LLMProvider>
        });

        #[cfg(feature = "media")]
        let media = config
            .cloudinary
            .as_ref()
            .map(|c| Arc::new(CloudinaryClient::new(c.clone())));

        Ok(Self {
            conn,
            config: Arc::new(config),
            jwt_manager: Arc::new(jwt_manager),
            auth_config,
            rate_limits: Arc::new(rate_limits),
            #[cfg(feature = "llm")]
            llm_provider,
            #[cfg(feature = "media")]
            media,
        })
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("AppState");

        debug
            .field("conn", &"DbPool")
            .field("config", &self.config)
            .field("jwt_manager", &"Arc<JwtManager>")
            .field("auth_config", &self.auth_config)
            .field("rate_limits", &self.rate_limits);

        #[cfg(feature = "llm")]
        debug.field("llm_provider", &self.llm_provider.is_some());

        #[cfg(feature = "media")]
        debug.field("media", &self.media.is_some());

        debug.finish()
    }
}
