use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::agent::AgentId;
use crate::domain::tenant::OrganizationId;

pub const DEFAULT_TTS_PROVIDER: &str = "elevenlabs";

/// Voice settings attached to an agent. `config` holds provider-specific
/// knobs (ElevenLabs `stability`, `similarity_boost`, ...).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TtsConfiguration {
    pub id: Option<String>,
    pub organization_id: Option<OrganizationId>,
    pub agent_id: Option<AgentId>,
    pub provider: String,
    pub voice_id: Option<String>,
    pub voice_name: Option<String>,
    pub language_code: Option<String>,
    pub speaking_rate: Option<f64>,
    pub pitch: Option<f64>,
    pub volume_gain_db: Option<f64>,
    pub config: Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl TtsConfiguration {
    pub fn default_for(voice_id: impl Into<String>) -> Self {
        Self {
            id: None,
            organization_id: None,
            agent_id: None,
            provider: DEFAULT_TTS_PROVIDER.to_string(),
            voice_id: Some(voice_id.into()),
            voice_name: Some("Rachel".to_string()),
            language_code: Some("en-US".to_string()),
            speaking_rate: Some(1.0),
            pitch: Some(0.0),
            volume_gain_db: Some(0.0),
            config: Value::Object(Default::default()),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    pub fn option_f64(&self, key: &str) -> Option<f64> {
        self.config.get(key).and_then(Value::as_f64)
    }

    pub fn option_bool(&self, key: &str) -> Option<bool> {
        self.config.get(key).and_then(Value::as_bool)
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::TtsConfiguration;

    #[test]
    fn default_configuration_targets_elevenlabs() {
        let config = TtsConfiguration::default_for("voice-1");
        assert_eq!(config.provider, "elevenlabs");
        assert_eq!(config.voice_id.as_deref(), Some("voice-1"));
        assert_eq!(config.language_code.as_deref(), Some("en-US"));
    }

    #[test]
    fn provider_options_are_read_from_config_json() {
        let mut config = TtsConfiguration::default_for("voice-1");
        config.config = json!({"stability": 0.3, "use_speaker_boost": false, "model_id": "m2"});

        assert_eq!(config.option_f64("stability"), Some(0.3));
        assert_eq!(config.option_bool("use_speaker_boost"), Some(false));
        assert_eq!(config.option_str("model_id"), Some("m2"));
        assert_eq!(config.option_f64("style"), None);
    }
}
