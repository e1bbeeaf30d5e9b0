use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use medvoice_agent::{AiService, LlmError, TtsError, TtsService};
use medvoice_core::config::{AppConfig, ConfigError, LoadOptions};
use medvoice_db::{connect_with_config, migrations, DbPool};

use crate::state::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("AI service initialization failed: {0}")]
    Ai(#[from] LlmError),
    #[error("TTS service initialization failed: {0}")]
    Tts(#[from] TtsError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let ai = AiService::from_config(&config.ai)?;
    let status = ai.status();
    if status.configured {
        info!(
            event_name = "system.bootstrap.ai_ready",
            correlation_id = "bootstrap",
            providers = %status.providers.join(","),
            mock_mode = status.mock_mode,
            "AI providers available"
        );
    } else {
        warn!(
            event_name = "system.bootstrap.ai_unconfigured",
            correlation_id = "bootstrap",
            "no AI provider configured; replies will use fallback text"
        );
    }

    let tts = TtsService::from_config(&config.tts)?;
    if !tts.is_configured() {
        warn!(
            event_name = "system.bootstrap.tts_unconfigured",
            correlation_id = "bootstrap",
            "ElevenLabs API key not set; replies will carry no audio"
        );
    }

    let state = AppState::new(
        db_pool.clone(),
        Arc::new(ai),
        Arc::new(tts),
        config.tts.default_voice_id.clone(),
    );

    Ok(Application { config, db_pool, state })
}

#[cfg(test)]
mod tests {
    use medvoice_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::{bootstrap, BootstrapError};

    fn overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                mock_responses: Some(true),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_and_builds_state() {
        let app = bootstrap(overrides("sqlite::memory:")).await.expect("bootstrap");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('conversations', 'ai_agents', 'audit_logs')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("inspect schema");
        assert_eq!(table_count, 3);
        assert!(app.state.ai.mock_mode());

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_rejects_non_sqlite_database() {
        let result = bootstrap(overrides("postgres://localhost/medvoice")).await;

        assert!(matches!(result, Err(BootstrapError::Config(_))));
    }
}
