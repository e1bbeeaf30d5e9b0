use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use medvoice_core::domain::conversation::TokenUsage;

use super::api_error_message;
use crate::llm::{AiProvider, ChatRole, Completion, CompletionRequest, LlmClient, LlmError};

/// `/v1/chat/completions` adapter.
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
    organization_id: Option<String>,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        organization_id: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            organization_id: organization_id.filter(|org| !org.trim().is_empty()),
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    functions: Option<&'a [Value]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<TokenUsage>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    function_call: Option<Value>,
}

fn build_request(request: &CompletionRequest) -> ChatCompletionRequest<'_> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(system) = request.system_prompt.as_deref().filter(|s| !s.is_empty()) {
        messages.push(WireMessage { role: ChatRole::System.as_str(), content: system });
    }
    messages.extend(
        request
            .messages
            .iter()
            .map(|message| WireMessage { role: message.role.as_str(), content: &message.content }),
    );

    let functions = request.functions.as_deref().filter(|functions| !functions.is_empty());

    ChatCompletionRequest {
        model: request.model.as_deref().unwrap_or(AiProvider::OpenAi.default_model()),
        messages,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        functions,
        function_call: functions.map(|_| "auto"),
    }
}

fn into_completion(response: ChatCompletionResponse) -> Result<Completion, LlmError> {
    let choice = response.choices.into_iter().next().ok_or(LlmError::EmptyResponse)?;
    Ok(Completion {
        content: choice.message.content.unwrap_or_default(),
        function_call: choice.message.function_call,
        finish_reason: choice.finish_reason,
        usage: response.usage,
        model: response.model,
    })
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn provider(&self) -> AiProvider {
        AiProvider::OpenAi
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let body = build_request(request);
        debug!(
            event_name = "ai.openai.request",
            model = body.model,
            message_count = body.messages.len(),
            "sending chat completion"
        );

        let mut builder = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body);
        if let Some(organization_id) = &self.organization_id {
            builder = builder.header("OpenAI-Organization", organization_id);
        }

        let response = builder.send().await.map_err(|e| LlmError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                provider: AiProvider::OpenAi.display_name(),
                status: status.as_u16(),
                message: api_error_message(&body, status),
            });
        }

        let parsed: ChatCompletionResponse =
            response.json().await.map_err(|e| LlmError::Decode(e.to_string()))?;
        into_completion(parsed)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{build_request, into_completion, ChatCompletionResponse};
    use crate::llm::{ChatMessage, CompletionRequest, LlmError};

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: None,
            messages: vec![ChatMessage::user("Can I book for Tuesday?")],
            system_prompt: Some("You are the front desk.".to_string()),
            temperature: 0.7,
            max_tokens: 1000,
            functions: None,
        }
    }

    #[test]
    fn system_prompt_is_prepended_and_default_model_used() {
        let request = request();
        let body = serde_json::to_value(build_request(&request)).expect("serialize");

        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["messages"][0], json!({"role": "system", "content": "You are the front desk."}));
        assert_eq!(body["messages"][1]["role"], "user");
        assert!(body.get("functions").is_none());
        assert!(body.get("function_call").is_none());
    }

    #[test]
    fn functions_are_forwarded_with_auto_call() {
        let mut request = request();
        request.functions = Some(vec![json!({"name": "book_appointment"})]);
        let body = serde_json::to_value(build_request(&request)).expect("serialize");

        assert_eq!(body["functions"][0]["name"], "book_appointment");
        assert_eq!(body["function_call"], "auto");
    }

    #[test]
    fn response_usage_is_normalised() {
        let response: ChatCompletionResponse = serde_json::from_value(json!({
            "model": "gpt-4-0613",
            "choices": [{
                "message": {"role": "assistant", "content": "Tuesday works."},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 4, "total_tokens": 16}
        }))
        .expect("response");

        let completion = into_completion(response).expect("completion");
        assert_eq!(completion.content, "Tuesday works.");
        assert_eq!(completion.model.as_deref(), Some("gpt-4-0613"));
        let usage = completion.usage.expect("usage");
        assert_eq!((usage.input_tokens, usage.output_tokens, usage.total_tokens), (12, 4, 16));
    }

    #[test]
    fn missing_total_is_derived_without_overflow() {
        let response: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": "ok"}}],
            "usage": {"prompt_tokens": u32::MAX, "completion_tokens": 5}
        }))
        .expect("response");

        let usage = into_completion(response).expect("completion").usage.expect("usage");
        assert_eq!(usage.total_tokens, u32::MAX);
    }

    #[test]
    fn empty_choices_are_an_error() {
        let response: ChatCompletionResponse =
            serde_json::from_value(json!({"choices": []})).expect("response");
        assert!(matches!(into_completion(response), Err(LlmError::EmptyResponse)));
    }
}
