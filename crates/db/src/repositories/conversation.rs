use chrono::Utc;
use sqlx::sqlite::SqliteRow;

use medvoice_core::domain::agent::AgentId;
use medvoice_core::domain::conversation::{
    Conversation, ConversationId, ConversationStatus, ConversationSummary, TranscriptEntry,
};
use medvoice_core::domain::tenant::{OrganizationId, UserId};

use super::{
    column, parse_json, parse_timestamp, timestamp, to_json, ConversationRepository,
    RepositoryError,
};
use crate::DbPool;

const SUMMARY_SELECT: &str = "SELECT c.id, c.organization_id, c.agent_id, c.user_id,
        c.patient_name, c.patient_phone, c.status, c.transcript_json, c.metadata_json,
        c.created_at, c.updated_at, a.name AS agent_name, a.type AS agent_type
    FROM conversations c
    LEFT JOIN ai_agents a ON a.id = c.agent_id";

pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_conversation(row: &SqliteRow) -> Result<Conversation, RepositoryError> {
    let status: String = column(row, "status")?;
    let status = status
        .parse::<ConversationStatus>()
        .map_err(|e| RepositoryError::Decode(format!("status: {e}")))?;
    let transcript_json: String = column(row, "transcript_json")?;
    let metadata_json: String = column(row, "metadata_json")?;
    let user_id: Option<String> = column(row, "user_id")?;
    let created_at: String = column(row, "created_at")?;
    let updated_at: String = column(row, "updated_at")?;

    Ok(Conversation {
        id: ConversationId(column(row, "id")?),
        organization_id: OrganizationId(column(row, "organization_id")?),
        agent_id: AgentId(column(row, "agent_id")?),
        user_id: user_id.map(UserId),
        patient_name: column(row, "patient_name")?,
        patient_phone: column(row, "patient_phone")?,
        status,
        transcript: parse_json(&transcript_json, "transcript_json")?,
        metadata: parse_json(&metadata_json, "metadata_json")?,
        created_at: parse_timestamp(&created_at, "created_at")?,
        updated_at: parse_timestamp(&updated_at, "updated_at")?,
    })
}

fn row_to_summary(row: &SqliteRow) -> Result<ConversationSummary, RepositoryError> {
    Ok(ConversationSummary {
        conversation: row_to_conversation(row)?,
        agent_name: column(row, "agent_name")?,
        agent_type: column(row, "agent_type")?,
    })
}

#[async_trait::async_trait]
impl ConversationRepository for SqlConversationRepository {
    async fn list_for_organization(
        &self,
        organization_id: &OrganizationId,
        limit: u32,
    ) -> Result<Vec<ConversationSummary>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{SUMMARY_SELECT} WHERE c.organization_id = ? ORDER BY c.created_at DESC, c.rowid DESC LIMIT ?"
        ))
        .bind(&organization_id.0)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_summary).collect()
    }

    async fn find_for_organization(
        &self,
        id: &ConversationId,
        organization_id: &OrganizationId,
    ) -> Result<Option<ConversationSummary>, RepositoryError> {
        let row = sqlx::query(&format!("{SUMMARY_SELECT} WHERE c.id = ? AND c.organization_id = ?"))
            .bind(&id.0)
            .bind(&organization_id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_summary).transpose()
    }

    async fn create(&self, conversation: &Conversation) -> Result<(), RepositoryError> {
        let transcript_json = to_json(&conversation.transcript, "transcript_json")?;
        let metadata_json = to_json(&conversation.metadata, "metadata_json")?;

        sqlx::query(
            "INSERT INTO conversations (id, organization_id, agent_id, user_id, patient_name,
                                        patient_phone, status, transcript_json, metadata_json,
                                        created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&conversation.id.0)
        .bind(&conversation.organization_id.0)
        .bind(&conversation.agent_id.0)
        .bind(conversation.user_id.as_ref().map(|user| user.0.as_str()))
        .bind(&conversation.patient_name)
        .bind(&conversation.patient_phone)
        .bind(conversation.status.as_str())
        .bind(transcript_json)
        .bind(metadata_json)
        .bind(timestamp(&conversation.created_at))
        .bind(timestamp(&conversation.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_transcript(
        &self,
        id: &ConversationId,
        organization_id: &OrganizationId,
        transcript: &[TranscriptEntry],
    ) -> Result<bool, RepositoryError> {
        let transcript_json = to_json(transcript, "transcript_json")?;

        let result = sqlx::query(
            "UPDATE conversations SET transcript_json = ?, updated_at = ?
             WHERE id = ? AND organization_id = ?",
        )
        .bind(transcript_json)
        .bind(timestamp(&Utc::now()))
        .bind(&id.0)
        .bind(&organization_id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_status(
        &self,
        id: &ConversationId,
        organization_id: &OrganizationId,
        status: ConversationStatus,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query(
            "UPDATE conversations SET status = ?, updated_at = ?
             WHERE id = ? AND organization_id = ?
             RETURNING id, organization_id, agent_id, user_id, patient_name, patient_phone,
                       status, transcript_json, metadata_json, created_at, updated_at",
        )
        .bind(status.as_str())
        .bind(timestamp(&Utc::now()))
        .bind(&id.0)
        .bind(&organization_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_conversation).transpose()
    }
}
