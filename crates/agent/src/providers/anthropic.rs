use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use medvoice_core::domain::conversation::TokenUsage;

use super::api_error_message;
use crate::llm::{AiProvider, ChatRole, Completion, CompletionRequest, LlmClient, LlmError};

pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";

/// `/v1/messages` adapter.
pub struct AnthropicClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl AnthropicClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string(), api_key })
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    model: Option<String>,
    stop_reason: Option<String>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

fn build_request(request: &CompletionRequest) -> MessagesRequest<'_> {
    let messages = request
        .messages
        .iter()
        .map(|message| WireMessage {
            role: match message.role {
                ChatRole::Assistant => "assistant",
                ChatRole::User | ChatRole::System => "user",
            },
            content: &message.content,
        })
        .collect();

    MessagesRequest {
        model: request.model.as_deref().unwrap_or(AiProvider::Anthropic.default_model()),
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        system: request.system_prompt.as_deref().unwrap_or(""),
        messages,
    }
}

fn into_completion(response: MessagesResponse) -> Result<Completion, LlmError> {
    let block = response.content.into_iter().next().ok_or(LlmError::EmptyResponse)?;

    Ok(Completion {
        content: block.text.unwrap_or_default(),
        function_call: None,
        finish_reason: response.stop_reason,
        usage: response.usage.map(|usage| TokenUsage::new(usage.input_tokens, usage.output_tokens)),
        model: response.model,
    })
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn provider(&self) -> AiProvider {
        AiProvider::Anthropic
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let body = build_request(request);
        debug!(
            event_name = "ai.anthropic.request",
            model = body.model,
            message_count = body.messages.len(),
            "sending messages request"
        );

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                provider: AiProvider::Anthropic.display_name(),
                status: status.as_u16(),
                message: api_error_message(&body, status),
            });
        }

        let parsed: MessagesResponse =
            response.json().await.map_err(|e| LlmError::Decode(e.to_string()))?;
        into_completion(parsed)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{build_request, into_completion, MessagesResponse};
    use crate::llm::{ChatMessage, ChatRole, CompletionRequest};

    #[test]
    fn system_prompt_moves_to_top_level_and_roles_collapse() {
        let request = CompletionRequest {
            model: Some("claude-3-haiku-20240307".to_string()),
            messages: vec![
                ChatMessage::new(ChatRole::System, "note"),
                ChatMessage::new(ChatRole::Assistant, "Hello!"),
                ChatMessage::user("I have a fever"),
            ],
            system_prompt: None,
            temperature: 0.2,
            max_tokens: 200,
            functions: None,
        };

        let body = serde_json::to_value(build_request(&request)).expect("serialize");
        assert_eq!(body["system"], "");
        assert_eq!(body["model"], "claude-3-haiku-20240307");
        let roles: Vec<&str> = body["messages"]
            .as_array()
            .expect("messages")
            .iter()
            .filter_map(|message| message["role"].as_str())
            .collect();
        assert_eq!(roles, vec!["user", "assistant", "user"]);
    }

    #[test]
    fn response_maps_first_text_block_and_usage() {
        let response: MessagesResponse = serde_json::from_value(json!({
            "model": "claude-3-opus-20240229",
            "content": [{"type": "text", "text": "Please describe your symptoms."}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 20, "output_tokens": 7}
        }))
        .expect("response");

        let completion = into_completion(response).expect("completion");
        assert_eq!(completion.content, "Please describe your symptoms.");
        assert_eq!(completion.finish_reason.as_deref(), Some("end_turn"));
        assert_eq!(completion.usage.map(|usage| usage.total_tokens), Some(27));
    }
}
