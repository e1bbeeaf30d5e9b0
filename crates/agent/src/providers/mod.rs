use reqwest::StatusCode;
use serde_json::Value;

pub mod anthropic;
pub mod mock;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use mock::MockResponder;
pub use openai::OpenAiClient;

/// Error text from a provider error body (`error.message`), falling back to
/// the HTTP reason phrase.
pub(crate) fn api_error_message(body: &str, status: StatusCode) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value.pointer("/error/message").and_then(Value::as_str).map(str::to_string)
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string())
}
