use medvoice_core::domain::agent::{AgentId, AgentType};
use medvoice_core::domain::tenant::{OrganizationId, UserId};
use medvoice_db::seed::{
    insert_organization, DEMO_ORGANIZATION_ID, DEMO_USER_ID, FRONT_DESK_AGENT_ID,
    TRIAGE_NURSE_AGENT_ID,
};
use medvoice_db::{
    connect_with_settings, migrations, seed_demo, AgentRepository, DbPool, SqlAgentRepository,
    SqlTenantRepository, TenantRepository,
};

type SeedContractTestResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
}

async fn seeded_pool() -> SeedContractTestResult<DbPool> {
    let pool = connect_with_settings("sqlite::memory:", 1, 30)
        .await
        .map_err(|error| format!("connect: {error}"))?;
    migrations::run_pending(&pool).await.map_err(|error| format!("migrations: {error}"))?;
    seed_demo(&pool).await.map_err(|error| format!("seed: {error}"))?;
    Ok(pool)
}

#[tokio::test]
async fn demo_operator_resolves_to_default_organization() -> SeedContractTestResult {
    let pool = seeded_pool().await?;
    let tenants = SqlTenantRepository::new(pool.clone());

    let organization = tenants
        .organization_for_user(&UserId(DEMO_USER_ID.to_string()))
        .await
        .map_err(|error| format!("lookup: {error}"))?;
    require_eq!(organization, Some(OrganizationId(DEMO_ORGANIZATION_ID.to_string())));

    let stranger = tenants
        .organization_for_user(&UserId("user-unknown".to_string()))
        .await
        .map_err(|error| format!("lookup: {error}"))?;
    require!(stranger.is_none(), "unknown users must not resolve to an organization");

    pool.close().await;
    Ok(())
}

#[tokio::test]
async fn seeded_agents_load_with_personas_and_default_provider() -> SeedContractTestResult {
    let pool = seeded_pool().await?;
    let agents = SqlAgentRepository::new(pool.clone());
    let organization = OrganizationId(DEMO_ORGANIZATION_ID.to_string());

    let listed = agents
        .list_for_organization(&organization)
        .await
        .map_err(|error| format!("list: {error}"))?;
    let names: Vec<&str> = listed.iter().map(|agent| agent.name.as_str()).collect();
    require_eq!(names, vec!["Front Desk", "Medical Assistant", "Triage Nurse Assistant"]);

    for agent in &listed {
        require!(agent.is_active, "seeded agent `{}` should be active", agent.name);
        require!(agent.kind().is_some(), "seeded agent `{}` should have a known persona", agent.name);
        require_eq!(agent.profile().provider, "openai".to_string());
    }

    let triage = agents
        .find_for_organization(&AgentId(TRIAGE_NURSE_AGENT_ID.to_string()), &organization)
        .await
        .map_err(|error| format!("find: {error}"))?
        .ok_or_else(|| "triage agent should exist".to_string())?;
    require_eq!(triage.kind(), Some(AgentType::TriageNurse));

    pool.close().await;
    Ok(())
}

#[tokio::test]
async fn seeded_agents_are_invisible_to_other_organizations() -> SeedContractTestResult {
    let pool = seeded_pool().await?;
    insert_organization(&pool, "org-other", "Other Clinic", None)
        .await
        .map_err(|error| format!("insert organization: {error}"))?;
    let agents = SqlAgentRepository::new(pool.clone());
    let other = OrganizationId("org-other".to_string());

    let listed =
        agents.list_for_organization(&other).await.map_err(|error| format!("list: {error}"))?;
    require!(listed.is_empty(), "other organization should see no seeded agents");

    let found = agents
        .find_for_organization(&AgentId(FRONT_DESK_AGENT_ID.to_string()), &other)
        .await
        .map_err(|error| format!("find: {error}"))?;
    require!(found.is_none(), "cross-organization lookups must miss");

    pool.close().await;
    Ok(())
}
