use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use medvoice_agent::{AiStatus, ChatMessage, CompletionRequest};
use medvoice_core::domain::agent::{DEFAULT_SYSTEM_PROMPT, DEFAULT_TEMPERATURE};
use medvoice_core::TokenUsage;

use crate::error::ApiError;
use crate::state::AppState;
use crate::tenant::correlation_id;

pub const DEFAULT_TEST_PROVIDER: &str = "openai";
pub const DEFAULT_TEST_MESSAGE: &str = "Hello, how are you?";
const TEST_MAX_TOKENS: u32 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct AiTestRequest {
    pub provider: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AiTestResponse {
    pub success: bool,
    pub provider: String,
    pub message: String,
    pub response: String,
    pub usage: Option<TokenUsage>,
    pub model: Option<String>,
}

pub async fn ai_status(State(state): State<AppState>) -> Json<AiStatus> {
    Json(state.ai.status())
}

/// Sends one short prompt through the requested provider.
pub async fn test_ai(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AiTestRequest>,
) -> Result<Json<AiTestResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let provider = request
        .provider
        .filter(|provider| !provider.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TEST_PROVIDER.to_string());
    let message = request
        .message
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TEST_MESSAGE.to_string());

    if !state.ai.is_configured(&provider) {
        return Err(ApiError::bad_request(
            format!("AI provider {provider} is not configured"),
            &correlation_id,
        )
        .with_available_providers(state.ai.available_providers()));
    }

    let completion = state
        .ai
        .generate(
            &provider,
            CompletionRequest {
                model: None,
                messages: vec![ChatMessage::user(message.clone())],
                system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
                temperature: DEFAULT_TEMPERATURE,
                max_tokens: TEST_MAX_TOKENS,
                functions: None,
            },
            None,
        )
        .await
        .map_err(|error| {
            ApiError::internal("Error testing AI service", &correlation_id)
                .with_error(error.to_string())
        })?;

    info!(
        event_name = "ai.test.completed",
        correlation_id = %correlation_id,
        provider = %provider,
        "AI provider test succeeded"
    );

    Ok(Json(AiTestResponse {
        success: true,
        provider,
        message,
        response: completion.content,
        usage: completion.usage,
        model: completion.model,
    }))
}
