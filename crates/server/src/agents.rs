use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use medvoice_agent::{AiProvider, ConversationContext};
use medvoice_core::{AgentId, TokenUsage};

use crate::error::ApiError;
use crate::state::AppState;
use crate::tenant::Tenant;

pub const DEFAULT_AGENT_TEST_MESSAGE: &str = "Hello, I need help with an appointment.";

#[derive(Debug, Default, Deserialize)]
pub struct AgentTestRequest {
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AgentTestResponse {
    pub success: bool,
    pub user_message: String,
    pub ai_response: String,
    pub usage: Option<TokenUsage>,
    pub model: Option<String>,
    pub provider: String,
    pub is_mock: bool,
}

/// Runs one completion against a stored agent's settings, with no history.
pub async fn test_agent(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(id): Path<String>,
    Json(request): Json<AgentTestRequest>,
) -> Result<Json<AgentTestResponse>, ApiError> {
    let correlation_id = tenant.correlation_id.as_str();
    let agent = state
        .agents
        .find_for_organization(&AgentId(id), &tenant.organization_id)
        .await
        .map_err(|error| ApiError::repository(error, correlation_id))?
        .ok_or_else(|| ApiError::not_found("Agent not found", correlation_id))?;

    let profile = agent.profile();
    let message = request
        .message
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_AGENT_TEST_MESSAGE.to_string());

    if !state.ai.is_configured(&profile.provider) {
        return Err(ApiError::bad_request(
            format!("AI provider \"{}\" is not configured", profile.provider),
            correlation_id,
        )
        .with_error(format!(
            "Set {} or enable ai.mock_responses for testing",
            key_variable(&profile.provider)
        ))
        .with_available_providers(state.ai.available_providers()));
    }

    let completion = state
        .ai
        .process_conversation(&profile, &[], &message, &ConversationContext::default())
        .await
        .map_err(|error| {
            ApiError::internal("Error generating AI response", correlation_id)
                .with_error(error.to_string())
        })?;

    info!(
        event_name = "agent.test.completed",
        correlation_id,
        organization_id = %tenant.organization_id.0,
        agent_id = %agent.id.0,
        provider = %profile.provider,
        "agent test completion succeeded"
    );

    Ok(Json(AgentTestResponse {
        success: true,
        user_message: message,
        ai_response: completion.content,
        usage: completion.usage,
        model: completion.model,
        provider: profile.provider,
        is_mock: state.ai.mock_mode(),
    }))
}

fn key_variable(provider: &str) -> &'static str {
    match provider.parse::<AiProvider>() {
        Ok(AiProvider::Anthropic) => "ANTHROPIC_API_KEY",
        _ => "OPENAI_API_KEY",
    }
}
