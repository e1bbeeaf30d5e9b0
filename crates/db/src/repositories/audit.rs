use async_trait::async_trait;

use medvoice_core::audit::{AuditEvent, AuditSink};
use medvoice_core::errors::ApplicationError;

use super::{timestamp, to_json, RepositoryError};
use crate::DbPool;

/// Persists audit events into `audit_logs`.
pub struct SqlAuditSink {
    pool: DbPool,
}

impl SqlAuditSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, event: &AuditEvent) -> Result<(), RepositoryError> {
        let details_json = to_json(&event.details, "details_json")?;

        sqlx::query(
            "INSERT INTO audit_logs (id, user_id, organization_id, correlation_id, action,
                                     resource_type, resource_id, outcome, details_json, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.event_id)
        .bind(event.user_id.as_ref().map(|user| user.0.as_str()))
        .bind(event.organization_id.as_ref().map(|org| org.0.as_str()))
        .bind(&event.correlation_id)
        .bind(&event.action)
        .bind(&event.resource_type)
        .bind(&event.resource_id)
        .bind(event.outcome.as_str())
        .bind(details_json)
        .bind(timestamp(&event.occurred_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl AuditSink for SqlAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), ApplicationError> {
        self.insert(&event).await.map_err(ApplicationError::from)
    }
}
