use chrono::Utc;
use serde::Serialize;

use crate::connection::DbPool;
use crate::repositories::{timestamp, RepositoryError};

pub const DEMO_ORGANIZATION_ID: &str = "org-default";
pub const DEMO_USER_ID: &str = "user-demo-operator";
pub const FRONT_DESK_AGENT_ID: &str = "agent-front-desk";
pub const MEDICAL_ASSISTANT_AGENT_ID: &str = "agent-medical-assistant";
pub const TRIAGE_NURSE_AGENT_ID: &str = "agent-triage-nurse";

struct SeedAgent {
    id: &'static str,
    name: &'static str,
    agent_type: &'static str,
    description: &'static str,
}

const DEFAULT_AGENTS: &[SeedAgent] = &[
    SeedAgent {
        id: FRONT_DESK_AGENT_ID,
        name: "Front Desk",
        agent_type: "front_desk",
        description: "Role-specific voice agent for appointment booking, reminders, and medication refill requests",
    },
    SeedAgent {
        id: MEDICAL_ASSISTANT_AGENT_ID,
        name: "Medical Assistant",
        agent_type: "medical_assistant",
        description: "Role-specific voice agent for pre-visit intake, EMR documentation hooks, and care coordination",
    },
    SeedAgent {
        id: TRIAGE_NURSE_AGENT_ID,
        name: "Triage Nurse Assistant",
        agent_type: "triage_nurse",
        description: "Role-specific voice agent for triage, symptom checker with red-flag escalation, and initial patient assessment",
    },
];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub organization_created: bool,
    pub user_created: bool,
    pub agents_created: usize,
    pub agents_existing: usize,
}

/// Creates the default organization, a demo operator and the default agents.
/// Rows that already exist are left untouched.
pub async fn seed_demo(pool: &DbPool) -> Result<SeedSummary, RepositoryError> {
    let mut summary = SeedSummary {
        organization_created: insert_organization(
            pool,
            DEMO_ORGANIZATION_ID,
            "Default Organization",
            Some("default"),
        )
        .await?,
        ..SeedSummary::default()
    };

    summary.user_created = sqlx::query(
        "INSERT INTO users (id, organization_id, email, name, role, created_at)
         VALUES (?, ?, ?, ?, 'operator', ?)
         ON CONFLICT(id) DO NOTHING",
    )
    .bind(DEMO_USER_ID)
    .bind(DEMO_ORGANIZATION_ID)
    .bind("operator@demo.medvoice.local")
    .bind("Demo Operator")
    .bind(timestamp(&Utc::now()))
    .execute(pool)
    .await?
    .rows_affected()
        > 0;

    for agent in DEFAULT_AGENTS {
        let now = timestamp(&Utc::now());
        let inserted = sqlx::query(
            "INSERT INTO ai_agents (id, organization_id, name, type, description, voice_model,
                                    temperature, max_tokens, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, 'openai', 0.7, 1000, 1, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(agent.id)
        .bind(DEMO_ORGANIZATION_ID)
        .bind(agent.name)
        .bind(agent.agent_type)
        .bind(agent.description)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await?
        .rows_affected()
            > 0;

        if inserted {
            summary.agents_created += 1;
        } else {
            summary.agents_existing += 1;
        }
    }

    Ok(summary)
}

/// Returns `true` when a new row was written.
pub async fn insert_organization(
    pool: &DbPool,
    id: &str,
    name: &str,
    subdomain: Option<&str>,
) -> Result<bool, RepositoryError> {
    let now = timestamp(&Utc::now());
    let result = sqlx::query(
        "INSERT INTO organizations (id, name, subdomain, is_active, created_at, updated_at)
         VALUES (?, ?, ?, 1, ?, ?)
         ON CONFLICT(id) DO NOTHING",
    )
    .bind(id)
    .bind(name)
    .bind(subdomain)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::{seed_demo, DEFAULT_AGENTS};
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn seed_is_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let first = seed_demo(&pool).await.expect("first seed");
        assert!(first.organization_created);
        assert!(first.user_created);
        assert_eq!(first.agents_created, DEFAULT_AGENTS.len());

        let second = seed_demo(&pool).await.expect("second seed");
        assert!(!second.organization_created);
        assert!(!second.user_created);
        assert_eq!(second.agents_created, 0);
        assert_eq!(second.agents_existing, DEFAULT_AGENTS.len());

        let agents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ai_agents")
            .fetch_one(&pool)
            .await
            .expect("count agents");
        assert_eq!(agents, 3);

        pool.close().await;
    }
}
