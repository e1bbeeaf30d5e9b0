use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use medvoice_agent::SynthesizedSpeech;
use medvoice_core::{AgentId, TtsConfiguration};

use crate::error::ApiError;
use crate::state::AppState;
use crate::tenant::Tenant;

const TEST_VOICE_NAME: &str = "Test Voice";

#[derive(Debug, Default, Deserialize)]
pub struct SynthesizeRequest {
    pub text: Option<String>,
    pub agent_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TtsTestRequest {
    pub text: Option<String>,
    pub agent_id: Option<String>,
    pub provider: Option<String>,
    pub voice_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SpeechResponse {
    pub success: bool,
    pub audio: String,
    pub format: String,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SpeechResponse {
    fn from_speech(speech: SynthesizedSpeech, message: Option<&str>) -> Self {
        Self {
            success: true,
            audio: speech.audio,
            format: speech.format,
            provider: speech.provider,
            message: message.map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VoiceCatalogue {
    pub voices: Vec<Value>,
}

/// Synthesizes with the agent's active voice, or the default ElevenLabs voice.
pub async fn synthesize(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Json(request): Json<SynthesizeRequest>,
) -> Result<Json<SpeechResponse>, ApiError> {
    let correlation_id = tenant.correlation_id.as_str();
    let text = required_text(request.text.as_deref())
        .ok_or_else(|| ApiError::bad_request("Text is required", correlation_id))?;

    let stored = match non_blank(request.agent_id.as_deref()) {
        Some(agent_id) => state
            .tts_configs
            .active_for_agent(&AgentId(agent_id.to_string()), &tenant.organization_id)
            .await
            .map_err(|error| ApiError::repository(error, correlation_id))?,
        None => None,
    };
    let config = stored.unwrap_or_else(|| state.default_tts());

    let speech = state.speech.synthesize(text, &config).await.map_err(|error| {
        ApiError::internal("Error synthesizing speech", correlation_id).with_error(error.to_string())
    })?;

    info!(
        event_name = "tts.synthesize.completed",
        correlation_id,
        organization_id = %tenant.organization_id.0,
        provider = %speech.provider,
        "speech synthesized"
    );
    Ok(Json(SpeechResponse::from_speech(speech, None)))
}

/// Request fields override the agent's latest voice, which overrides the defaults.
pub async fn test_tts(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Json(request): Json<TtsTestRequest>,
) -> Result<Json<SpeechResponse>, ApiError> {
    let correlation_id = tenant.correlation_id.as_str();
    let text = required_text(request.text.as_deref())
        .ok_or_else(|| ApiError::bad_request("Text is required for testing", correlation_id))?;

    let stored = match non_blank(request.agent_id.as_deref()) {
        Some(agent_id) => state
            .tts_configs
            .latest_for_agent(&AgentId(agent_id.to_string()), &tenant.organization_id)
            .await
            .map_err(|error| ApiError::repository(error, correlation_id))?,
        None => None,
    };
    let config = test_configuration(
        stored,
        state.default_tts(),
        non_blank(request.provider.as_deref()),
        non_blank(request.voice_id.as_deref()),
    );

    let speech = state.speech.synthesize(text, &config).await.map_err(|error| {
        ApiError::internal("TTS test failed", correlation_id).with_error(error.to_string())
    })?;

    Ok(Json(SpeechResponse::from_speech(speech, Some("TTS test successful"))))
}

pub async fn elevenlabs_voices(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
) -> Result<Json<VoiceCatalogue>, ApiError> {
    let voices = state.speech.list_voices().await.map_err(|error| {
        ApiError::internal("Error fetching ElevenLabs voices", &tenant.correlation_id)
            .with_error(error.to_string())
    })?;

    Ok(Json(VoiceCatalogue { voices }))
}

fn test_configuration(
    stored: Option<TtsConfiguration>,
    defaults: TtsConfiguration,
    provider: Option<&str>,
    voice_id: Option<&str>,
) -> TtsConfiguration {
    let mut config = stored.unwrap_or_else(|| TtsConfiguration {
        voice_name: Some(TEST_VOICE_NAME.to_string()),
        ..defaults.clone()
    });
    if let Some(provider) = provider {
        config.provider = provider.to_string();
    }
    config.voice_id = voice_id
        .map(str::to_string)
        .or_else(|| config.voice_id.clone().filter(|voice| !voice.trim().is_empty()))
        .or(defaults.voice_id);
    config
}

fn required_text(text: Option<&str>) -> Option<&str> {
    text.filter(|text| !text.trim().is_empty())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
