use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, error};

use medvoice_core::config::AiConfig;
use medvoice_core::domain::agent::AgentProfile;
use medvoice_core::domain::conversation::TranscriptEntry;

use crate::llm::{AiProvider, Completion, CompletionRequest, LlmClient, LlmError};
use crate::prompt::{build_message_history, build_system_prompt, ConversationContext};
use crate::providers::{AnthropicClient, MockResponder, OpenAiClient};

pub const MOCK_PROVIDER: &str = "mock";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OpenAiStatus {
    pub configured: bool,
    pub has_key: bool,
    pub has_org_id: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProviderStatus {
    pub configured: bool,
    pub has_key: bool,
}

/// Snapshot of which chat providers can serve requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AiStatus {
    pub configured: bool,
    pub providers: Vec<String>,
    pub openai: OpenAiStatus,
    pub anthropic: ProviderStatus,
    pub mock_mode: bool,
}

/// Multi-provider chat completion dispatcher.
pub struct AiService {
    openai: Option<Arc<dyn LlmClient>>,
    anthropic: Option<Arc<dyn LlmClient>>,
    mock: Option<MockResponder>,
    has_openai_org_id: bool,
}

impl AiService {
    pub fn from_config(config: &AiConfig) -> Result<Self, LlmError> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let organization_id = config
            .openai_organization_id
            .as_deref()
            .map(str::trim)
            .filter(|org| !org.is_empty())
            .map(str::to_string);

        let openai: Option<Arc<dyn LlmClient>> = match trimmed_key(config.openai_api_key.as_ref()) {
            Some(key) => Some(Arc::new(OpenAiClient::new(
                config.openai_base_url.clone(),
                key,
                organization_id.clone(),
                timeout,
            )?)),
            None => None,
        };
        let anthropic: Option<Arc<dyn LlmClient>> =
            match trimmed_key(config.anthropic_api_key.as_ref()) {
                Some(key) => Some(Arc::new(AnthropicClient::new(
                    config.anthropic_base_url.clone(),
                    key,
                    timeout,
                )?)),
                None => None,
            };

        Ok(Self::with_clients(openai, anthropic, config.mock_responses)
            .with_openai_organization(organization_id.is_some()))
    }

    pub fn with_clients(
        openai: Option<Arc<dyn LlmClient>>,
        anthropic: Option<Arc<dyn LlmClient>>,
        mock_mode: bool,
    ) -> Self {
        Self {
            openai,
            anthropic,
            mock: mock_mode.then_some(MockResponder),
            has_openai_org_id: false,
        }
    }

    pub fn with_openai_organization(mut self, has_org_id: bool) -> Self {
        self.has_openai_org_id = has_org_id;
        self
    }

    pub fn mock_mode(&self) -> bool {
        self.mock.is_some()
    }

    fn client_for(&self, provider: AiProvider) -> Option<&Arc<dyn LlmClient>> {
        match provider {
            AiProvider::OpenAi => self.openai.as_ref(),
            AiProvider::Anthropic => self.anthropic.as_ref(),
        }
    }

    /// Runs one completion. Mock mode answers every request regardless of
    /// the requested provider.
    pub async fn generate(
        &self,
        provider: &str,
        mut request: CompletionRequest,
        agent_type: Option<&str>,
    ) -> Result<Completion, LlmError> {
        if let Some(mock) = &self.mock {
            debug!(event_name = "ai.generate.mock", provider, "serving mock completion");
            return Ok(mock.complete(agent_type));
        }

        let result = self.dispatch(provider, &mut request).await;
        if let Err(err) = &result {
            error!(event_name = "ai.generate.failed", provider, error = %err, "AI provider call failed");
        }
        result
    }

    async fn dispatch(
        &self,
        provider: &str,
        request: &mut CompletionRequest,
    ) -> Result<Completion, LlmError> {
        let parsed: AiProvider = provider.parse()?;
        let client = self
            .client_for(parsed)
            .ok_or(LlmError::NotConfigured { provider: parsed.display_name() })?;
        if request.model.as_deref().map_or(true, |model| model.trim().is_empty()) {
            request.model = Some(parsed.default_model().to_string());
        }
        client.complete(request).await
    }

    pub async fn process_conversation(
        &self,
        profile: &AgentProfile,
        history: &[TranscriptEntry],
        user_message: &str,
        context: &ConversationContext,
    ) -> Result<Completion, LlmError> {
        let request = CompletionRequest {
            model: profile.model.clone(),
            messages: build_message_history(history, user_message),
            system_prompt: Some(build_system_prompt(profile, context)),
            temperature: profile.temperature,
            max_tokens: profile.max_tokens,
            functions: profile.functions.clone(),
        };

        self.generate(&profile.provider, request, profile.agent_type.as_deref()).await
    }

    pub fn is_configured(&self, provider: &str) -> bool {
        if self.mock_mode() {
            return true;
        }
        provider
            .parse::<AiProvider>()
            .map(|parsed| self.client_for(parsed).is_some())
            .unwrap_or(false)
    }

    pub fn available_providers(&self) -> Vec<String> {
        let mut providers = Vec::new();
        if self.openai.is_some() {
            providers.push(AiProvider::OpenAi.as_str().to_string());
        }
        if self.anthropic.is_some() {
            providers.push(AiProvider::Anthropic.as_str().to_string());
        }
        if self.mock_mode() {
            providers.push(MOCK_PROVIDER.to_string());
        }
        providers
    }

    pub fn status(&self) -> AiStatus {
        let providers = self.available_providers();
        AiStatus {
            configured: !providers.is_empty(),
            providers,
            openai: OpenAiStatus {
                configured: self.is_configured(AiProvider::OpenAi.as_str()),
                has_key: self.openai.is_some(),
                has_org_id: self.has_openai_org_id,
            },
            anthropic: ProviderStatus {
                configured: self.is_configured(AiProvider::Anthropic.as_str()),
                has_key: self.anthropic.is_some(),
            },
            mock_mode: self.mock_mode(),
        }
    }
}

fn trimmed_key(secret: Option<&SecretString>) -> Option<SecretString> {
    let trimmed = secret?.expose_secret().trim();
    (!trimmed.is_empty()).then(|| SecretString::from(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use medvoice_core::config::AppConfig;
    use medvoice_core::domain::agent::AgentProfile;
    use medvoice_core::domain::conversation::TranscriptEntry;

    use super::AiService;
    use crate::llm::{
        AiProvider, ChatMessage, Completion, CompletionRequest, LlmClient, LlmError,
    };
    use crate::prompt::ConversationContext;

    struct RecordingClient {
        provider: AiProvider,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl RecordingClient {
        fn new(provider: AiProvider) -> Arc<Self> {
            Arc::new(Self { provider, requests: Mutex::new(Vec::new()) })
        }

        fn last_request(&self) -> CompletionRequest {
            self.requests.lock().expect("lock").last().cloned().expect("a request was recorded")
        }
    }

    #[async_trait]
    impl LlmClient for RecordingClient {
        fn provider(&self) -> AiProvider {
            self.provider
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
            self.requests.lock().expect("lock").push(request.clone());
            Ok(Completion {
                content: format!("reply from {}", self.provider.as_str()),
                function_call: None,
                finish_reason: Some("stop".to_string()),
                usage: None,
                model: request.model.clone(),
            })
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: None,
            messages: vec![ChatMessage::user("Hello")],
            system_prompt: None,
            temperature: 0.7,
            max_tokens: 100,
            functions: None,
        }
    }

    #[tokio::test]
    async fn dispatches_to_provider_with_default_model() {
        let anthropic = RecordingClient::new(AiProvider::Anthropic);
        let service = AiService::with_clients(None, Some(anthropic.clone()), false);

        let completion = service.generate("Claude", request(), None).await.expect("completion");
        assert_eq!(completion.content, "reply from anthropic");
        assert_eq!(anthropic.last_request().model.as_deref(), Some("claude-3-opus-20240229"));
    }

    #[tokio::test]
    async fn missing_client_is_not_configured() {
        let service = AiService::with_clients(None, None, false);

        let error = service.generate("openai", request(), None).await.expect_err("no key");
        assert!(matches!(error, LlmError::NotConfigured { provider: "OpenAI" }));
        assert_eq!(error.to_string(), "OpenAI API key not configured");

        let error = service.generate("cohere", request(), None).await.expect_err("unknown");
        assert!(matches!(error, LlmError::UnsupportedProvider(_)));
    }

    #[tokio::test]
    async fn mock_mode_overrides_every_provider() {
        let openai = RecordingClient::new(AiProvider::OpenAi);
        let service = AiService::with_clients(Some(openai.clone()), None, true);

        let completion =
            service.generate("cohere", request(), Some("front_desk")).await.expect("mock");
        assert_eq!(completion.model.as_deref(), Some("mock-model"));
        assert!(completion.content.starts_with("Thank you for calling."));
        assert!(openai.requests.lock().expect("lock").is_empty());
        assert!(service.is_configured("anything"));
    }

    #[tokio::test]
    async fn process_conversation_builds_prompt_and_history() {
        let openai = RecordingClient::new(AiProvider::OpenAi);
        let service = AiService::with_clients(Some(openai.clone()), None, false);
        let profile = AgentProfile {
            model: Some("gpt-4o-mini".to_string()),
            max_tokens: 250,
            agent_type: Some("triage_nurse".to_string()),
            ..AgentProfile::default()
        };
        let history = vec![TranscriptEntry::assistant("How can I help?")];

        service
            .process_conversation(
                &profile,
                &history,
                "My chest hurts",
                &ConversationContext::for_patient(Some("Sam Lee".to_string())),
            )
            .await
            .expect("completion");

        let sent = openai.last_request();
        assert_eq!(sent.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(sent.max_tokens, 250);
        assert_eq!(sent.messages.len(), 2);
        let system = sent.system_prompt.expect("system prompt");
        assert!(system.starts_with("You are a triage nurse AI assistant."));
        assert!(system.ends_with("Current patient: Sam Lee"));
    }

    #[test]
    fn status_reports_available_providers_in_order() {
        let service = AiService::with_clients(
            Some(RecordingClient::new(AiProvider::OpenAi)),
            Some(RecordingClient::new(AiProvider::Anthropic)),
            true,
        )
        .with_openai_organization(true);

        let status = service.status();
        assert!(status.configured);
        assert_eq!(status.providers, vec!["openai", "anthropic", "mock"]);
        assert!(status.openai.has_org_id);
        assert!(status.anthropic.configured);
        assert!(status.mock_mode);
    }

    #[test]
    fn blank_keys_from_config_are_treated_as_absent() {
        let mut config = AppConfig::default().ai;
        config.openai_api_key = Some("   ".to_string().into());
        config.anthropic_api_key = Some(" sk-ant-test ".to_string().into());

        let service = AiService::from_config(&config).expect("service");
        assert!(!service.is_configured("openai"));
        assert!(service.is_configured("anthropic"));
        assert!(!service.is_configured("gemini"));
        assert_eq!(service.available_providers(), vec!["anthropic"]);
        assert!(service.status().configured);
    }
}
