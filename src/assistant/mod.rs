//! Chat assistant answering learners and formateurs about the platform.

use axum::{extract::State, response::IntoResponse, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::shared::error::ApiError;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::ok_json;
use crate::core::urls::ApiUrls;
use crate::learn::CourseEngine;
use crate::llm::{ChatMessage, LLMProvider};
use crate::security::auth_api::{AuthenticatedUser, Permission, Role};

pub const MAX_MESSAGE_CHARS: usize = 4000;
pub const MAX_HISTORY_TURNS: usize = 20;
pub const MAX_COURSE_TITLES: i64 = 20;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

pub fn validate_message(message: &str) -> Result<String, ApiError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(ApiError::Validation("Message is required".to_string()));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::Validation(format!(
            "Message must be at most {} characters",
            MAX_MESSAGE_CHARS
        )));
    }
    Ok(message.to_string())
}

/// Keeps the most recent user/assistant turns. Client-supplied system messages are dropped.
pub fn trim_history(history: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let turns: Vec<ChatMessage> = history
        .into_iter()
        .filter(|m| m.role == "user" || m.role == "assistant")
        .filter(|m| !m.content.trim().is_empty())
        .collect();
    let skip = turns.len().saturating_sub(MAX_HISTORY_TURNS);
    turns.into_iter().skip(skip).collect()
}

pub fn build_system_prompt(platform_name: &str, role: Role, course_titles: &[String]) -> String {
    let mut prompt = format!(
        "You are the learning assistant of {platform_name}, an online course platform. \
         You are talking to a user with the role \"{role}\". \
         Answer questions about courses, enrollment, quizzes and studying. \
         Be concise and never invent courses that are not listed."
    );

    if course_titles.is_empty() {
        prompt.push_str("\nNo courses are published yet.");
    } else {
        prompt.push_str("\nPublished courses:");
        for title in course_titles {
            prompt.push_str("\n- ");
            prompt.push_str(title);
        }
    }
    prompt
}

pub struct Assistant {
    provider: Arc<dyn LLMProvider>,
    platform_name: String,
}

impl Assistant {
    pub fn new(provider: Arc<dyn LLMProvider>, platform_name: impl Into<String>) -> Self {
        Self {
            provider,
            platform_name: platform_name.into(),
        }
    }

    pub async fn reply(
        &self,
        role: Role,
        course_titles: &[String],
        request: ChatRequest,
    ) -> Result<String, ApiError> {
        let message = validate_message(&request.message)?;

        let mut messages = vec![ChatMessage::system(build_system_prompt(
            &self.platform_name,
            role,
            course_titles,
        ))];
        messages.extend(trim_history(request.history));
        messages.push(ChatMessage::user(message));

        self.provider
            .generate(&messages, &serde_json::Value::Null)
            .await
            .map_err(|e| {
                warn!("Assistant completion failed: {}", e);
                ApiError::Upstream("The assistant is unavailable right now".to_string())
            })
    }
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(&Permission::UseAssistant)?;
    let provider = state
        .llm_provider
        .clone()
        .ok_or_else(|| ApiError::Unavailable("The assistant is not configured".to_string()))?;
    validate_message(&request.message)?;

    if !state
        .rate_limits
        .assistant_limiter
        .check(&user.user_id.to_string())
    {
        return Err(ApiError::LimitReached(
            "Too many assistant requests, slow down".to_string(),
        ));
    }

    let titles = CourseEngine::new(state.conn.clone())
        .published_titles(MAX_COURSE_TITLES)
        .await
        .unwrap_or_else(|e| {
            warn!("Could not load course titles for the assistant: {}", e);
            Vec::new()
        });

    let assistant = Assistant::new(provider, state.config.server.platform_name.clone());
    let reply = assistant.reply(user.role, &titles, request).await?;

    info!("Assistant answered user {}", user.user_id);
    Ok(ok_json(ChatResponse { reply }))
}

pub fn configure_assistant_routes() -> Router<Arc<AppState>> {
    Router::new().route(ApiUrls::ASSISTANT_CHAT, post(chat))
}
