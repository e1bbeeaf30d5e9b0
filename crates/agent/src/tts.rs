use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use medvoice_core::config::TtsConfig;
use medvoice_core::domain::conversation::{AudioClip, AUDIO_FORMAT_MPEG};
use medvoice_core::domain::tts::TtsConfiguration;

pub const DEFAULT_ELEVENLABS_MODEL: &str = "eleven_monolingual_v1";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TtsProvider {
    ElevenLabs,
    Google,
    Aws,
    Azure,
}

impl TtsProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ElevenLabs => "elevenlabs",
            Self::Google => "google",
            Self::Aws => "aws",
            Self::Azure => "azure",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ElevenLabs => "ElevenLabs",
            Self::Google => "Google TTS",
            Self::Aws => "AWS Polly TTS",
            Self::Azure => "Azure TTS",
        }
    }
}

impl FromStr for TtsProvider {
    type Err = TtsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "elevenlabs" => Ok(Self::ElevenLabs),
            "google" => Ok(Self::Google),
            "aws" => Ok(Self::Aws),
            "azure" => Ok(Self::Azure),
            other => Err(TtsError::UnsupportedProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("{provider} API key is not configured")]
    NotConfigured { provider: &'static str },
    #[error("unsupported TTS provider: {0}")]
    UnsupportedProvider(String),
    #[error("{0} not yet implemented")]
    NotImplemented(&'static str),
    #[error("ElevenLabs request failed: {0}")]
    Transport(String),
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("malformed TTS response: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SynthesizedSpeech {
    /// Base64-encoded audio.
    pub audio: String,
    pub format: String,
    pub provider: String,
}

impl SynthesizedSpeech {
    pub fn into_clip(self) -> AudioClip {
        AudioClip { data: self.audio, format: self.format }
    }
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        config: &TtsConfiguration,
    ) -> Result<SynthesizedSpeech, TtsError>;

    async fn list_voices(&self) -> Result<Vec<Value>, TtsError>;
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VoiceSettings {
    pub stability: f64,
    pub similarity_boost: f64,
    pub style: f64,
    pub use_speaker_boost: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: String,
    voice_settings: VoiceSettings,
}

fn speech_request<'a>(text: &'a str, config: &TtsConfiguration) -> SpeechRequest<'a> {
    SpeechRequest {
        text,
        model_id: config.option_str("model_id").unwrap_or(DEFAULT_ELEVENLABS_MODEL).to_string(),
        voice_settings: VoiceSettings {
            stability: config.option_f64("stability").unwrap_or(0.5),
            similarity_boost: config.option_f64("similarity_boost").unwrap_or(0.75),
            style: config.option_f64("style").unwrap_or(0.0),
            use_speaker_boost: config.option_bool("use_speaker_boost").unwrap_or(true),
        },
    }
}

fn elevenlabs_error(body: &str, status: StatusCode) -> TtsError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value.pointer("/detail/message").and_then(Value::as_str).map(str::to_string)
        })
        .unwrap_or_else(|| format!("ElevenLabs API error: {}", status.as_u16()));
    TtsError::Api { status: status.as_u16(), message }
}

pub struct ElevenLabsClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

#[derive(Debug, Deserialize)]
struct VoicesResponse {
    #[serde(default)]
    voices: Vec<Value>,
}

impl ElevenLabsClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, TtsError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TtsError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string(), api_key })
    }

    /// Returns the raw audio bytes.
    async fn text_to_speech(
        &self,
        voice_id: &str,
        request: &SpeechRequest<'_>,
    ) -> Result<Vec<u8>, TtsError> {
        let response = self
            .client
            .post(format!("{}/v1/text-to-speech/{voice_id}", self.base_url))
            .header("Accept", AUDIO_FORMAT_MPEG)
            .header("xi-api-key", self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| TtsError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(elevenlabs_error(&body, status));
        }

        let bytes = response.bytes().await.map_err(|e| TtsError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    pub async fn voices(&self) -> Result<Vec<Value>, TtsError> {
        let response = self
            .client
            .get(format!("{}/v1/voices", self.base_url))
            .header("Accept", "application/json")
            .header("xi-api-key", self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| TtsError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(elevenlabs_error(&body, status));
        }

        let parsed: VoicesResponse = response.json().await.map_err(|_| {
            TtsError::Decode("failed to parse ElevenLabs voices response".to_string())
        })?;
        Ok(parsed.voices)
    }
}

/// Provider dispatch for speech synthesis.
pub struct TtsService {
    elevenlabs: Option<ElevenLabsClient>,
    default_voice_id: String,
}

impl TtsService {
    pub fn from_config(config: &TtsConfig) -> Result<Self, TtsError> {
        let key = config
            .elevenlabs_api_key
            .as_ref()
            .map(|key| key.expose_secret().trim())
            .filter(|key| !key.is_empty())
            .map(|key| SecretString::from(key.to_string()));
        let elevenlabs = match key {
            Some(key) => Some(ElevenLabsClient::new(
                config.elevenlabs_base_url.clone(),
                key,
                Duration::from_secs(config.timeout_secs.max(1)),
            )?),
            None => None,
        };

        Ok(Self { elevenlabs, default_voice_id: config.default_voice_id.clone() })
    }

    pub fn is_configured(&self) -> bool {
        self.elevenlabs.is_some()
    }

    /// Configuration used when an agent has none stored.
    pub fn default_configuration(&self) -> TtsConfiguration {
        TtsConfiguration::default_for(self.default_voice_id.clone())
    }

    fn elevenlabs(&self) -> Result<&ElevenLabsClient, TtsError> {
        self.elevenlabs
            .as_ref()
            .ok_or(TtsError::NotConfigured { provider: TtsProvider::ElevenLabs.display_name() })
    }
}

#[async_trait]
impl SpeechSynthesizer for TtsService {
    async fn synthesize(
        &self,
        text: &str,
        config: &TtsConfiguration,
    ) -> Result<SynthesizedSpeech, TtsError> {
        let provider: TtsProvider = config.provider.parse()?;
        let result = match provider {
            TtsProvider::ElevenLabs => {
                let client = self.elevenlabs()?;
                let voice_id = config
                    .voice_id
                    .as_deref()
                    .filter(|voice| !voice.trim().is_empty())
                    .unwrap_or(self.default_voice_id.as_str());
                let request = speech_request(text, config);
                debug!(
                    event_name = "tts.elevenlabs.request",
                    voice_id,
                    model_id = %request.model_id,
                    text_length = text.len(),
                    "synthesizing speech"
                );
                client.text_to_speech(voice_id, &request).await
            }
            other => Err(TtsError::NotImplemented(other.display_name())),
        };

        match result {
            Ok(bytes) => Ok(SynthesizedSpeech {
                audio: base64::engine::general_purpose::STANDARD.encode(bytes),
                format: AUDIO_FORMAT_MPEG.to_string(),
                provider: provider.as_str().to_string(),
            }),
            Err(err) => {
                error!(
                    event_name = "tts.synthesis.failed",
                    provider = provider.as_str(),
                    error = %err,
                    "TTS synthesis error"
                );
                Err(err)
            }
        }
    }

    async fn list_voices(&self) -> Result<Vec<Value>, TtsError> {
        self.elevenlabs()?.voices().await
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use serde_json::json;

    use medvoice_core::config::AppConfig;
    use medvoice_core::domain::tts::TtsConfiguration;

    use super::{
        elevenlabs_error, speech_request, SpeechSynthesizer, TtsError, TtsProvider, TtsService,
    };

    #[test]
    fn request_defaults_match_elevenlabs_recommendations() {
        let config = TtsConfiguration::default_for("voice-1");
        let body = serde_json::to_value(speech_request("Hello", &config)).expect("serialize");

        assert_eq!(
            body,
            json!({
                "text": "Hello",
                "model_id": "eleven_monolingual_v1",
                "voice_settings": {
                    "stability": 0.5,
                    "similarity_boost": 0.75,
                    "style": 0.0,
                    "use_speaker_boost": true
                }
            })
        );
    }

    #[test]
    fn request_reads_overrides_from_provider_config() {
        let mut config = TtsConfiguration::default_for("voice-1");
        config.config = json!({"model_id": "eleven_turbo_v2", "stability": 0.2, "use_speaker_boost": false});

        let request = speech_request("Hi", &config);
        assert_eq!(request.model_id, "eleven_turbo_v2");
        assert_eq!(request.voice_settings.stability, 0.2);
        assert!(!request.voice_settings.use_speaker_boost);
        assert_eq!(request.voice_settings.similarity_boost, 0.75);
    }

    #[test]
    fn api_errors_prefer_detail_message() {
        let error = elevenlabs_error(
            r#"{"detail": {"status": "invalid_api_key", "message": "Invalid API key"}}"#,
            StatusCode::UNAUTHORIZED,
        );
        assert_eq!(error.to_string(), "Invalid API key");

        let error = elevenlabs_error("", StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.to_string(), "ElevenLabs API error: 500");
    }

    #[test]
    fn providers_parse_and_reject_unknown() {
        assert_eq!("ElevenLabs".parse::<TtsProvider>().ok(), Some(TtsProvider::ElevenLabs));
        assert!(matches!(
            "polly".parse::<TtsProvider>(),
            Err(TtsError::UnsupportedProvider(ref name)) if name == "polly"
        ));
    }

    #[tokio::test]
    async fn unconfigured_and_unimplemented_providers_fail_cleanly() {
        let service = TtsService::from_config(&AppConfig::default().tts).expect("service");
        assert!(!service.is_configured());

        let default = service.default_configuration();
        assert_eq!(default.voice_id.as_deref(), Some("21m00Tcm4TlvDq8ikWAM"));
        let error = service.synthesize("Hello", &default).await.expect_err("no key");
        assert_eq!(error.to_string(), "ElevenLabs API key is not configured");

        let mut google = default.clone();
        google.provider = "google".to_string();
        let error = service.synthesize("Hello", &google).await.expect_err("not implemented");
        assert_eq!(error.to_string(), "Google TTS not yet implemented");

        let error = service.list_voices().await.expect_err("no key");
        assert!(matches!(error, TtsError::NotConfigured { .. }));
    }
}
