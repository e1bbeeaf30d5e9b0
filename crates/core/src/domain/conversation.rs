use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::agent::AgentId;
use crate::domain::tenant::{OrganizationId, UserId};
use crate::errors::DomainError;

pub const AUDIO_FORMAT_MPEG: &str = "audio/mpeg";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Completed,
    Transferred,
    Abandoned,
    Failed,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Transferred => "transferred",
            Self::Abandoned => "abandoned",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for ConversationStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "transferred" => Ok(Self::Transferred),
            "abandoned" => Ok(Self::Abandoned),
            "failed" => Ok(Self::Failed),
            other => Err(DomainError::InvalidConversationStatus(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptRole {
    #[default]
    User,
    Assistant,
    System,
}

/// Stored transcripts may carry OpenAI (`prompt_tokens`/`completion_tokens`)
/// or Anthropic (`input_tokens`/`output_tokens`, no total) usage shapes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireUsage")]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self { input_tokens, output_tokens, total_tokens: input_tokens.saturating_add(output_tokens) }
    }
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default, alias = "prompt_tokens")]
    input_tokens: u32,
    #[serde(default, alias = "completion_tokens")]
    output_tokens: u32,
    #[serde(default)]
    total_tokens: Option<u32>,
}

impl From<WireUsage> for TokenUsage {
    fn from(wire: WireUsage) -> Self {
        let usage = Self::new(wire.input_tokens, wire.output_tokens);
        match wire.total_tokens {
            Some(total_tokens) => Self { total_tokens, ..usage },
            None => usage,
        }
    }
}

/// Treats an explicit JSON `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioClip {
    /// Base64-encoded audio bytes.
    pub data: String,
    pub format: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: TranscriptRole,
    // Older transcripts stored the utterance under `text`; function-call
    // replies stored a null content.
    #[serde(default, alias = "text", deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioClip>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TranscriptEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TranscriptRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(TranscriptRole::Assistant, content)
    }

    fn new(role: TranscriptRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            usage: None,
            model: None,
            audio: None,
            error: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub organization_id: OrganizationId,
    pub agent_id: AgentId,
    pub user_id: Option<UserId>,
    pub patient_name: Option<String>,
    pub patient_phone: Option<String>,
    pub status: ConversationStatus,
    pub transcript: Vec<TranscriptEntry>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn start(
        id: ConversationId,
        organization_id: OrganizationId,
        agent_id: AgentId,
        user_id: Option<UserId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            organization_id,
            agent_id,
            user_id,
            patient_name: None,
            patient_phone: None,
            status: ConversationStatus::Active,
            transcript: Vec::new(),
            metadata: Value::Object(Default::default()),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Conversation row joined with the owning agent's display fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub agent_name: Option<String>,
    pub agent_type: Option<String>,
}
