use sqlx::sqlite::SqliteRow;

use medvoice_core::domain::agent::AgentId;
use medvoice_core::domain::tenant::OrganizationId;
use medvoice_core::domain::tts::TtsConfiguration;

use super::{
    column, parse_json, parse_timestamp, timestamp, to_json, RepositoryError, TtsConfigRepository,
};
use crate::DbPool;

const TTS_SELECT: &str = "SELECT id, organization_id, agent_id, provider, voice_id, voice_name,
        language_code, speaking_rate, pitch, volume_gain_db, config_json, is_active, created_at
    FROM tts_configurations";

pub struct SqlTtsConfigRepository {
    pool: DbPool,
}

impl SqlTtsConfigRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_config(row: &SqliteRow) -> Result<TtsConfiguration, RepositoryError> {
    let config_json: String = column(row, "config_json")?;
    let is_active: i64 = column(row, "is_active")?;
    let created_at: String = column(row, "created_at")?;

    Ok(TtsConfiguration {
        id: Some(column(row, "id")?),
        organization_id: Some(OrganizationId(column(row, "organization_id")?)),
        agent_id: Some(AgentId(column(row, "agent_id")?)),
        provider: column(row, "provider")?,
        voice_id: column(row, "voice_id")?,
        voice_name: column(row, "voice_name")?,
        language_code: column(row, "language_code")?,
        speaking_rate: column(row, "speaking_rate")?,
        pitch: column(row, "pitch")?,
        volume_gain_db: column(row, "volume_gain_db")?,
        config: parse_json(&config_json, "config_json")?,
        is_active: is_active != 0,
        created_at: parse_timestamp(&created_at, "created_at")?,
    })
}

#[async_trait::async_trait]
impl TtsConfigRepository for SqlTtsConfigRepository {
    async fn active_for_agent(
        &self,
        agent_id: &AgentId,
        organization_id: &OrganizationId,
    ) -> Result<Option<TtsConfiguration>, RepositoryError> {
        let row = sqlx::query(&format!(
            "{TTS_SELECT} WHERE agent_id = ? AND organization_id = ? AND is_active = 1
             ORDER BY created_at DESC, rowid DESC LIMIT 1"
        ))
        .bind(&agent_id.0)
        .bind(&organization_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_config).transpose()
    }

    async fn latest_for_agent(
        &self,
        agent_id: &AgentId,
        organization_id: &OrganizationId,
    ) -> Result<Option<TtsConfiguration>, RepositoryError> {
        let row = sqlx::query(&format!(
            "{TTS_SELECT} WHERE agent_id = ? AND organization_id = ?
             ORDER BY created_at DESC, rowid DESC LIMIT 1"
        ))
        .bind(&agent_id.0)
        .bind(&organization_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_config).transpose()
    }

    async fn save(&self, config: &TtsConfiguration) -> Result<(), RepositoryError> {
        let (Some(organization_id), Some(agent_id)) = (&config.organization_id, &config.agent_id)
        else {
            return Err(RepositoryError::Constraint(
                "tts configuration requires organization_id and agent_id".to_string(),
            ));
        };
        let id = config.id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let config_json = to_json(&config.config, "config_json")?;

        sqlx::query(
            "INSERT INTO tts_configurations (id, organization_id, agent_id, provider, voice_id,
                                             voice_name, language_code, speaking_rate, pitch,
                                             volume_gain_db, config_json, is_active, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 provider = excluded.provider,
                 voice_id = excluded.voice_id,
                 voice_name = excluded.voice_name,
                 language_code = excluded.language_code,
                 speaking_rate = excluded.speaking_rate,
                 pitch = excluded.pitch,
                 volume_gain_db = excluded.volume_gain_db,
                 config_json = excluded.config_json,
                 is_active = excluded.is_active",
        )
        .bind(id)
        .bind(&organization_id.0)
        .bind(&agent_id.0)
        .bind(&config.provider)
        .bind(&config.voice_id)
        .bind(&config.voice_name)
        .bind(&config.language_code)
        .bind(config.speaking_rate)
        .bind(config.pitch)
        .bind(config.volume_gain_db)
        .bind(config_json)
        .bind(config.is_active)
        .bind(timestamp(&config.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::json;

    use medvoice_core::domain::agent::AgentId;
    use medvoice_core::domain::tenant::OrganizationId;
    use medvoice_core::domain::tts::TtsConfiguration;

    use super::SqlTtsConfigRepository;
    use crate::repositories::{RepositoryError, TtsConfigRepository};
    use crate::seed::{seed_demo, DEMO_ORGANIZATION_ID, FRONT_DESK_AGENT_ID};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn seeded_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        seed_demo(&pool).await.expect("seed");
        pool
    }

    fn config(id: &str, voice: &str, active: bool, minutes_ago: i64) -> TtsConfiguration {
        let mut config = TtsConfiguration::default_for(voice);
        config.id = Some(id.to_string());
        config.organization_id = Some(OrganizationId(DEMO_ORGANIZATION_ID.to_string()));
        config.agent_id = Some(AgentId(FRONT_DESK_AGENT_ID.to_string()));
        config.is_active = active;
        config.config = json!({"stability": 0.4});
        config.created_at = Utc::now() - Duration::minutes(minutes_ago);
        config
    }

    #[tokio::test]
    async fn active_lookup_skips_inactive_rows_but_latest_does_not() {
        let pool = seeded_pool().await;
        let repo = SqlTtsConfigRepository::new(pool.clone());
        let agent = AgentId(FRONT_DESK_AGENT_ID.to_string());
        let org = OrganizationId(DEMO_ORGANIZATION_ID.to_string());

        repo.save(&config("tts-old", "voice-active", true, 10)).await.expect("save active");
        repo.save(&config("tts-new", "voice-inactive", false, 1)).await.expect("save inactive");

        let active = repo.active_for_agent(&agent, &org).await.expect("active").expect("row");
        assert_eq!(active.voice_id.as_deref(), Some("voice-active"));
        assert_eq!(active.option_f64("stability"), Some(0.4));

        let latest = repo.latest_for_agent(&agent, &org).await.expect("latest").expect("row");
        assert_eq!(latest.voice_id.as_deref(), Some("voice-inactive"));
        assert!(!latest.is_active);

        let other = OrganizationId("org-other".to_string());
        assert!(repo.active_for_agent(&agent, &other).await.expect("lookup").is_none());

        pool.close().await;
    }

    #[tokio::test]
    async fn save_requires_owner_identifiers() {
        let pool = seeded_pool().await;
        let repo = SqlTtsConfigRepository::new(pool.clone());

        let error = repo
            .save(&TtsConfiguration::default_for("voice"))
            .await
            .expect_err("missing owner should fail");
        assert!(matches!(error, RepositoryError::Constraint(_)));

        pool.close().await;
    }
}
