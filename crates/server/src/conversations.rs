//! Conversation endpoints:
//!
//! - `GET   /api/conversations`              list the caller's conversations
//! - `GET   /api/conversations/{id}`         one conversation with agent prompt fields
//! - `POST  /api/conversations`              start a conversation with a greeting
//! - `POST  /api/conversations/{id}/message` run one caller turn through the AI pipeline
//! - `PATCH /api/conversations/{id}/status`  change the conversation status

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use medvoice_agent::{ConversationContext, ConversationTurn};
use medvoice_core::audit::{
    AuditEvent, AuditOutcome, CONVERSATION_CREATED, CONVERSATION_MESSAGE,
    CONVERSATION_STATUS_CHANGED,
};
use medvoice_core::{
    Agent, AgentId, AgentProfile, ApplicationError, AudioClip, Conversation, ConversationId,
    ConversationStatus, ConversationSummary, TokenUsage, TranscriptEntry,
};
use medvoice_db::repositories::CONVERSATION_LIST_LIMIT;

use crate::error::ApiError;
use crate::state::AppState;
use crate::tenant::Tenant;

const RESOURCE_TYPE: &str = "conversations";

#[derive(Debug, Default, Deserialize)]
pub struct CreateConversationRequest {
    pub agent_id: Option<String>,
    pub patient_name: Option<String>,
    pub patient_phone: Option<String>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageRequest {
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusRequest {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConversationList {
    pub conversations: Vec<ConversationSummary>,
}

/// A conversation plus the prompt settings of the agent answering it.
#[derive(Debug, Serialize)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub summary: ConversationSummary,
    pub system_prompt: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ConversationEnvelope<T> {
    pub conversation: T,
}

#[derive(Debug, Serialize)]
pub struct CreatedConversation {
    pub conversation: Conversation,
    pub greeting: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
    pub transcript: Vec<TranscriptEntry>,
    pub usage: Option<TokenUsage>,
    pub error: Option<String>,
    pub audio: Option<AudioClip>,
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
) -> Result<Json<ConversationList>, ApiError> {
    let conversations = state
        .conversations
        .list_for_organization(&tenant.organization_id, CONVERSATION_LIST_LIMIT)
        .await
        .map_err(|error| ApiError::repository(error, &tenant.correlation_id))?;

    Ok(Json(ConversationList { conversations }))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(id): Path<String>,
) -> Result<Json<ConversationEnvelope<ConversationDetail>>, ApiError> {
    let correlation_id = tenant.correlation_id.as_str();
    let summary = state
        .conversations
        .find_for_organization(&ConversationId(id), &tenant.organization_id)
        .await
        .map_err(|error| ApiError::repository(error, correlation_id))?
        .ok_or_else(|| ApiError::not_found("Conversation not found", correlation_id))?;

    let agent = state
        .agents
        .find_for_organization(&summary.conversation.agent_id, &tenant.organization_id)
        .await
        .map_err(|error| ApiError::repository(error, correlation_id))?;

    Ok(Json(ConversationEnvelope {
        conversation: ConversationDetail {
            summary,
            system_prompt: agent.as_ref().and_then(|agent| agent.system_prompt.clone()),
            temperature: agent.as_ref().and_then(|agent| agent.temperature),
            max_tokens: agent.as_ref().and_then(|agent| agent.max_tokens),
        },
    }))
}

pub async fn create_conversation(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Json(request): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<CreatedConversation>), ApiError> {
    let correlation_id = tenant.correlation_id.as_str();
    let agent_id = non_blank(request.agent_id.as_deref())
        .ok_or_else(|| ApiError::bad_request("Agent ID is required", correlation_id))?;

    let agent = state
        .agents
        .find_for_organization(&AgentId(agent_id.to_string()), &tenant.organization_id)
        .await
        .map_err(|error| ApiError::repository(error, correlation_id))?
        .ok_or_else(|| ApiError::not_found("Agent not found", correlation_id))?;

    let patient_name = non_blank(request.patient_name.as_deref()).map(str::to_string);
    let greeting = state.runtime.greet(&agent, patient_name.as_deref()).await;

    let mut conversation = Conversation::start(
        ConversationId(Uuid::new_v4().to_string()),
        tenant.organization_id.clone(),
        agent.id.clone(),
        Some(tenant.user_id.clone()),
    );
    conversation.patient_name = patient_name;
    conversation.patient_phone = non_blank(request.patient_phone.as_deref()).map(str::to_string);
    if let Some(metadata) = request.metadata.filter(Value::is_object) {
        conversation.metadata = metadata;
    }
    conversation.transcript.push(TranscriptEntry::assistant(greeting.clone()));

    state
        .conversations
        .create(&conversation)
        .await
        .map_err(|error| ApiError::repository(error, correlation_id))?;

    state
        .record_audit(
            AuditEvent::for_tenant(&tenant, CONVERSATION_CREATED, RESOURCE_TYPE, AuditOutcome::Success)
                .with_resource(conversation.id.0.clone())
                .with_detail("agent_id", agent.id.0.clone()),
        )
        .await;
    info!(
        event_name = "conversation.created",
        correlation_id,
        organization_id = %tenant.organization_id.0,
        conversation_id = %conversation.id.0,
        agent_id = %agent.id.0,
        "conversation started"
    );

    Ok((StatusCode::CREATED, Json(CreatedConversation { conversation, greeting })))
}

pub async fn post_message(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(id): Path<String>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let correlation_id = tenant.correlation_id.as_str();
    let message = request
        .message
        .as_deref()
        .filter(|message| !message.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Message is required", correlation_id))?;

    let conversation_id = ConversationId(id);
    let conversation = state
        .conversations
        .find_for_organization(&conversation_id, &tenant.organization_id)
        .await
        .map_err(|error| ApiError::repository(error, correlation_id))?
        .ok_or_else(|| ApiError::not_found("Conversation not found", correlation_id))?
        .conversation;

    let agent = state
        .agents
        .find_for_organization(&conversation.agent_id, &tenant.organization_id)
        .await
        .map_err(|error| ApiError::repository(error, correlation_id))?;
    let profile = agent.as_ref().map(Agent::profile).unwrap_or_else(AgentProfile::default);

    let tts = match state
        .tts_configs
        .active_for_agent(&conversation.agent_id, &tenant.organization_id)
        .await
    {
        Ok(config) => config,
        Err(error) => {
            warn!(
                event_name = "conversation.tts_config.lookup_failed",
                correlation_id,
                conversation_id = %conversation_id.0,
                error = %error,
                "skipping audio for this reply"
            );
            None
        }
    };

    let context = ConversationContext {
        patient_name: conversation.patient_name.clone(),
        patient_phone: conversation.patient_phone.clone(),
        business_hours: None,
    };
    let outcome = state
        .runtime
        .reply(ConversationTurn {
            profile: &profile,
            history: &conversation.transcript,
            message,
            context: &context,
            fallback_message: agent.as_ref().and_then(|agent| agent.fallback_message.as_deref()),
            tts: tts.as_ref(),
        })
        .await;

    let updated = state
        .conversations
        .update_transcript(&conversation_id, &tenant.organization_id, &outcome.transcript)
        .await
        .map_err(|error| ApiError::repository(error, correlation_id))?;
    if !updated {
        return Err(ApiError::not_found("Conversation not found", correlation_id));
    }

    let audit_outcome =
        if outcome.error.is_some() { AuditOutcome::Degraded } else { AuditOutcome::Success };
    state
        .record_audit(
            AuditEvent::for_tenant(&tenant, CONVERSATION_MESSAGE, RESOURCE_TYPE, audit_outcome)
                .with_resource(conversation_id.0.clone())
                .with_detail("message_length", message.chars().count())
                .with_detail("has_error", outcome.error.is_some()),
        )
        .await;
    info!(
        event_name = "conversation.message.processed",
        correlation_id,
        organization_id = %tenant.organization_id.0,
        conversation_id = %conversation_id.0,
        has_error = outcome.error.is_some(),
        has_audio = outcome.audio.is_some(),
        "conversation turn completed"
    );

    Ok(Json(MessageResponse {
        message: outcome.reply,
        transcript: outcome.transcript,
        usage: outcome.usage,
        error: outcome.error,
        audio: outcome.audio,
    }))
}

pub async fn update_status(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<ConversationEnvelope<Conversation>>, ApiError> {
    let correlation_id = tenant.correlation_id.as_str();
    let raw = non_blank(request.status.as_deref())
        .ok_or_else(|| ApiError::bad_request("Status is required", correlation_id))?;
    let status: ConversationStatus = raw
        .parse()
        .map_err(|error| ApiError::from(ApplicationError::from(error).into_interface(correlation_id)))?;

    let conversation_id = ConversationId(id);
    let conversation = state
        .conversations
        .update_status(&conversation_id, &tenant.organization_id, status)
        .await
        .map_err(|error| ApiError::repository(error, correlation_id))?
        .ok_or_else(|| ApiError::not_found("Conversation not found", correlation_id))?;

    state
        .record_audit(
            AuditEvent::for_tenant(
                &tenant,
                CONVERSATION_STATUS_CHANGED,
                RESOURCE_TYPE,
                AuditOutcome::Success,
            )
            .with_resource(conversation_id.0.clone())
            .with_detail("status", status.as_str()),
        )
        .await;

    Ok(Json(ConversationEnvelope { conversation }))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
