use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use medvoice_core::domain::conversation::{TokenUsage, TranscriptRole};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-opus-20240229";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl From<TranscriptRole> for ChatRole {
    fn from(role: TranscriptRole) -> Self {
        match role {
            TranscriptRole::User => Self::User,
            TranscriptRole::Assistant => Self::Assistant,
            TranscriptRole::System => Self::System,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }
}

/// One provider-agnostic completion call. `model: None` means the
/// provider's default model.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub functions: Option<Vec<Value>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Completion {
    pub content: String,
    pub function_call: Option<Value>,
    pub finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
    pub model: Option<String>,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{provider} API key not configured")]
    NotConfigured { provider: &'static str },
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("{provider} API error ({status}): {message}")]
    Api { provider: &'static str, status: u16, message: String },
    #[error("malformed provider response: {0}")]
    Decode(String),
    #[error("provider returned no completion")]
    EmptyResponse,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    OpenAi,
    Anthropic,
}

impl AiProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Anthropic => "Anthropic",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => DEFAULT_OPENAI_MODEL,
            Self::Anthropic => DEFAULT_ANTHROPIC_MODEL,
        }
    }
}

impl FromStr for AiProvider {
    type Err = LlmError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            other => Err(LlmError::UnsupportedProvider(other.to_string())),
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> AiProvider;

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::{AiProvider, ChatRole, LlmError};
    use medvoice_core::domain::conversation::TranscriptRole;

    #[test]
    fn provider_aliases_parse_case_insensitively() {
        assert_eq!("OpenAI".parse::<AiProvider>().ok(), Some(AiProvider::OpenAi));
        assert_eq!("claude".parse::<AiProvider>().ok(), Some(AiProvider::Anthropic));
        assert_eq!(" Anthropic ".parse::<AiProvider>().ok(), Some(AiProvider::Anthropic));
    }

    #[test]
    fn unknown_provider_is_unsupported() {
        let error = "gemini".parse::<AiProvider>().expect_err("unsupported");
        assert!(matches!(error, LlmError::UnsupportedProvider(ref name) if name == "gemini"));
        assert_eq!(error.to_string(), "unsupported provider: gemini");
    }

    #[test]
    fn transcript_roles_map_to_chat_roles() {
        assert_eq!(ChatRole::from(TranscriptRole::Assistant), ChatRole::Assistant);
        assert_eq!(ChatRole::from(TranscriptRole::User).as_str(), "user");
    }
}
