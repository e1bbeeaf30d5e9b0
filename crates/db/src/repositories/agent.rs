use sqlx::sqlite::SqliteRow;

use medvoice_core::domain::agent::{Agent, AgentId};
use medvoice_core::domain::tenant::OrganizationId;

use super::{column, parse_json, parse_timestamp, timestamp, to_json, AgentRepository, RepositoryError};
use crate::DbPool;

const AGENT_COLUMNS: &str = "id, organization_id, name, type, description, system_prompt,
        voice_model, model, temperature, max_tokens, greeting_message, fallback_message,
        functions_json, is_active, created_at, updated_at";

pub struct SqlAgentRepository {
    pool: DbPool,
}

impl SqlAgentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn row_to_agent(row: &SqliteRow) -> Result<Agent, RepositoryError> {
    let functions_json: Option<String> = column(row, "functions_json")?;
    let functions = match functions_json.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(parse_json(raw, "functions_json")?),
        _ => None,
    };
    let is_active: i64 = column(row, "is_active")?;
    let created_at: String = column(row, "created_at")?;
    let updated_at: String = column(row, "updated_at")?;

    Ok(Agent {
        id: AgentId(column(row, "id")?),
        organization_id: OrganizationId(column(row, "organization_id")?),
        name: column(row, "name")?,
        agent_type: column(row, "type")?,
        description: column(row, "description")?,
        system_prompt: column(row, "system_prompt")?,
        provider: column(row, "voice_model")?,
        model: column(row, "model")?,
        temperature: column(row, "temperature")?,
        max_tokens: column(row, "max_tokens")?,
        greeting_message: column(row, "greeting_message")?,
        fallback_message: column(row, "fallback_message")?,
        functions,
        is_active: is_active != 0,
        created_at: parse_timestamp(&created_at, "created_at")?,
        updated_at: parse_timestamp(&updated_at, "updated_at")?,
    })
}

#[async_trait::async_trait]
impl AgentRepository for SqlAgentRepository {
    async fn find_for_organization(
        &self,
        id: &AgentId,
        organization_id: &OrganizationId,
    ) -> Result<Option<Agent>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {AGENT_COLUMNS} FROM ai_agents WHERE id = ? AND organization_id = ?"
        ))
        .bind(&id.0)
        .bind(&organization_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_agent).transpose()
    }

    async fn list_for_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<Agent>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {AGENT_COLUMNS} FROM ai_agents WHERE organization_id = ? ORDER BY name ASC"
        ))
        .bind(&organization_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_agent).collect()
    }

    async fn save(&self, agent: Agent) -> Result<(), RepositoryError> {
        let functions_json =
            agent.functions.as_ref().map(|functions| to_json(functions, "functions_json")).transpose()?;

        sqlx::query(
            "INSERT INTO ai_agents (id, organization_id, name, type, description, system_prompt,
                                    voice_model, model, temperature, max_tokens, greeting_message,
                                    fallback_message, functions_json, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 type = excluded.type,
                 description = excluded.description,
                 system_prompt = excluded.system_prompt,
                 voice_model = excluded.voice_model,
                 model = excluded.model,
                 temperature = excluded.temperature,
                 max_tokens = excluded.max_tokens,
                 greeting_message = excluded.greeting_message,
                 fallback_message = excluded.fallback_message,
                 functions_json = excluded.functions_json,
                 is_active = excluded.is_active,
                 updated_at = excluded.updated_at",
        )
        .bind(&agent.id.0)
        .bind(&agent.organization_id.0)
        .bind(&agent.name)
        .bind(&agent.agent_type)
        .bind(&agent.description)
        .bind(&agent.system_prompt)
        .bind(&agent.provider)
        .bind(&agent.model)
        .bind(agent.temperature)
        .bind(agent.max_tokens)
        .bind(&agent.greeting_message)
        .bind(&agent.fallback_message)
        .bind(functions_json)
        .bind(agent.is_active)
        .bind(timestamp(&agent.created_at))
        .bind(timestamp(&agent.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use medvoice_core::domain::agent::{Agent, AgentId};
    use medvoice_core::domain::tenant::OrganizationId;

    use super::SqlAgentRepository;
    use crate::repositories::AgentRepository;
    use crate::seed::{insert_organization, DEMO_ORGANIZATION_ID};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn pool_with_orgs() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        insert_organization(&pool, DEMO_ORGANIZATION_ID, "Demo Clinic", Some("demo"))
            .await
            .expect("org");
        insert_organization(&pool, "org-other", "Other Clinic", None).await.expect("org");
        pool
    }

    fn agent(id: &str, organization: &str) -> Agent {
        Agent {
            id: AgentId(id.to_string()),
            organization_id: OrganizationId(organization.to_string()),
            name: "Billing Helper".to_string(),
            agent_type: Some("billing_specialist".to_string()),
            description: Some("Answers billing questions".to_string()),
            system_prompt: Some("Be concise.".to_string()),
            provider: Some("anthropic".to_string()),
            model: Some("claude-3-haiku-20240307".to_string()),
            temperature: Some(0.3),
            max_tokens: Some(300),
            greeting_message: Some("Hi, billing here.".to_string()),
            fallback_message: None,
            functions: Some(vec![json!({"name": "lookup_balance"})]),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn save_and_find_round_trips_agent_settings() {
        let pool = pool_with_orgs().await;
        let repo = SqlAgentRepository::new(pool.clone());
        let org = OrganizationId(DEMO_ORGANIZATION_ID.to_string());

        repo.save(agent("agent-billing", DEMO_ORGANIZATION_ID)).await.expect("save");

        let found = repo
            .find_for_organization(&AgentId("agent-billing".to_string()), &org)
            .await
            .expect("find")
            .expect("agent exists");
        assert_eq!(found.provider.as_deref(), Some("anthropic"));
        assert_eq!(found.max_tokens, Some(300));
        assert_eq!(found.functions.as_ref().map(Vec::len), Some(1));
        assert_eq!(found.profile().temperature, 0.3);

        pool.close().await;
    }

    #[tokio::test]
    async fn agents_are_scoped_to_their_organization() {
        let pool = pool_with_orgs().await;
        let repo = SqlAgentRepository::new(pool.clone());

        repo.save(agent("agent-billing", DEMO_ORGANIZATION_ID)).await.expect("save");

        let other = OrganizationId("org-other".to_string());
        let cross_tenant = repo
            .find_for_organization(&AgentId("agent-billing".to_string()), &other)
            .await
            .expect("find");
        assert!(cross_tenant.is_none());
        assert!(repo.list_for_organization(&other).await.expect("list").is_empty());

        pool.close().await;
    }

    #[tokio::test]
    async fn save_updates_existing_agent() {
        let pool = pool_with_orgs().await;
        let repo = SqlAgentRepository::new(pool.clone());
        let org = OrganizationId(DEMO_ORGANIZATION_ID.to_string());

        let mut billing = agent("agent-billing", DEMO_ORGANIZATION_ID);
        repo.save(billing.clone()).await.expect("insert");
        billing.name = "Billing Desk".to_string();
        billing.functions = None;
        repo.save(billing).await.expect("update");

        let listed = repo.list_for_organization(&org).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Billing Desk");
        assert!(listed[0].functions.is_none());

        pool.close().await;
    }
}
