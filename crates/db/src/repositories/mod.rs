use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use thiserror::Error;

use medvoice_core::domain::agent::{Agent, AgentId};
use medvoice_core::domain::conversation::{
    Conversation, ConversationId, ConversationStatus, ConversationSummary, TranscriptEntry,
};
use medvoice_core::domain::tenant::{OrganizationId, UserId};
use medvoice_core::domain::tts::TtsConfiguration;
use medvoice_core::errors::ApplicationError;

pub mod agent;
pub mod audit;
pub mod conversation;
pub mod memory;
pub mod tenant;
pub mod tts_config;

pub use agent::SqlAgentRepository;
pub use audit::SqlAuditSink;
pub use conversation::SqlConversationRepository;
pub use memory::{InMemoryAgentRepository, InMemoryConversationRepository};
pub use tenant::SqlTenantRepository;
pub use tts_config::SqlTtsConfigRepository;

/// Upper bound on conversations returned by a single listing.
pub const CONVERSATION_LIST_LIMIT: u32 = 100;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("constraint violation: {0}")]
    Constraint(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Persistence(value.to_string())
    }
}

#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn organization_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<OrganizationId>, RepositoryError>;
}

#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn find_for_organization(
        &self,
        id: &AgentId,
        organization_id: &OrganizationId,
    ) -> Result<Option<Agent>, RepositoryError>;

    async fn list_for_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<Agent>, RepositoryError>;

    async fn save(&self, agent: Agent) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Newest first, at most `limit` rows.
    async fn list_for_organization(
        &self,
        organization_id: &OrganizationId,
        limit: u32,
    ) -> Result<Vec<ConversationSummary>, RepositoryError>;

    async fn find_for_organization(
        &self,
        id: &ConversationId,
        organization_id: &OrganizationId,
    ) -> Result<Option<ConversationSummary>, RepositoryError>;

    async fn create(&self, conversation: &Conversation) -> Result<(), RepositoryError>;

    /// Returns `false` when the conversation does not exist in the organization.
    async fn update_transcript(
        &self,
        id: &ConversationId,
        organization_id: &OrganizationId,
        transcript: &[TranscriptEntry],
    ) -> Result<bool, RepositoryError>;

    async fn update_status(
        &self,
        id: &ConversationId,
        organization_id: &OrganizationId,
        status: ConversationStatus,
    ) -> Result<Option<Conversation>, RepositoryError>;
}

#[async_trait]
pub trait TtsConfigRepository: Send + Sync {
    /// Newest active configuration for the agent.
    async fn active_for_agent(
        &self,
        agent_id: &AgentId,
        organization_id: &OrganizationId,
    ) -> Result<Option<TtsConfiguration>, RepositoryError>;

    /// Newest configuration for the agent regardless of `is_active`.
    async fn latest_for_agent(
        &self,
        agent_id: &AgentId,
        organization_id: &OrganizationId,
    ) -> Result<Option<TtsConfiguration>, RepositoryError>;

    async fn save(&self, config: &TtsConfiguration) -> Result<(), RepositoryError>;
}

pub(crate) fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name).map_err(|e| RepositoryError::Decode(format!("{name}: {e}")))
}

pub(crate) fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str, column: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{column}: invalid timestamp `{raw}`: {e}")))
}

pub(crate) fn parse_json<T>(raw: &str, column: &str) -> Result<T, RepositoryError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_str(raw).map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

pub(crate) fn to_json<T>(value: &T, column: &str) -> Result<String, RepositoryError>
where
    T: serde::Serialize + ?Sized,
{
    serde_json::to_string(value).map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}
