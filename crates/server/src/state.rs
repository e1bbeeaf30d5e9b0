use std::sync::Arc;

use tracing::warn;

use medvoice_agent::{AiService, ConversationRuntime, SpeechSynthesizer};
use medvoice_core::{
    audit::{AuditEvent, AuditSink},
    TtsConfiguration,
};
use medvoice_db::{
    AgentRepository, ConversationRepository, DbPool, SqlAgentRepository, SqlAuditSink,
    SqlConversationRepository, SqlTenantRepository, SqlTtsConfigRepository, TenantRepository,
    TtsConfigRepository,
};

/// Shared handles for every request handler.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub tenants: Arc<dyn TenantRepository>,
    pub agents: Arc<dyn AgentRepository>,
    pub conversations: Arc<dyn ConversationRepository>,
    pub tts_configs: Arc<dyn TtsConfigRepository>,
    pub audit: Arc<dyn AuditSink>,
    pub ai: Arc<AiService>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub runtime: Arc<ConversationRuntime>,
    pub default_voice_id: String,
}

impl AppState {
    pub fn new(
        db_pool: DbPool,
        ai: Arc<AiService>,
        speech: Arc<dyn SpeechSynthesizer>,
        default_voice_id: impl Into<String>,
    ) -> Self {
        let runtime = Arc::new(ConversationRuntime::new(ai.clone(), Some(speech.clone())));
        Self {
            tenants: Arc::new(SqlTenantRepository::new(db_pool.clone())),
            agents: Arc::new(SqlAgentRepository::new(db_pool.clone())),
            conversations: Arc::new(SqlConversationRepository::new(db_pool.clone())),
            tts_configs: Arc::new(SqlTtsConfigRepository::new(db_pool.clone())),
            audit: Arc::new(SqlAuditSink::new(db_pool.clone())),
            db_pool,
            ai,
            speech,
            runtime,
            default_voice_id: default_voice_id.into(),
        }
    }

    /// Voice used when an agent has no stored TTS configuration.
    pub fn default_tts(&self) -> TtsConfiguration {
        TtsConfiguration::default_for(self.default_voice_id.clone())
    }

    /// Audit writes never fail the request that triggered them.
    pub async fn record_audit(&self, event: AuditEvent) {
        let action = event.action.clone();
        let correlation_id = event.correlation_id.clone();
        if let Err(error) = self.audit.record(event).await {
            warn!(
                event_name = "api.audit.write_failed",
                correlation_id = %correlation_id,
                action = %action,
                error = %error,
                "failed to record audit event"
            );
        }
    }
}
