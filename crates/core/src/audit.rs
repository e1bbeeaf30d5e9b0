use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::tenant::{OrganizationId, TenantContext, UserId};
use crate::errors::ApplicationError;

pub const CONVERSATION_MESSAGE: &str = "CONVERSATION_MESSAGE";
pub const CONVERSATION_CREATED: &str = "CONVERSATION_CREATED";
pub const CONVERSATION_STATUS_CHANGED: &str = "CONVERSATION_STATUS_CHANGED";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Success,
    Degraded,
    Failed,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
        }
    }
}

/// One row of the tenant audit trail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub user_id: Option<UserId>,
    pub organization_id: Option<OrganizationId>,
    pub correlation_id: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub outcome: AuditOutcome,
    pub details: BTreeMap<String, Value>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        correlation_id: impl Into<String>,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            user_id: None,
            organization_id: None,
            correlation_id: correlation_id.into(),
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: None,
            outcome,
            details: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn for_tenant(
        tenant: &TenantContext,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        let mut event = Self::new(tenant.correlation_id.clone(), action, resource_type, outcome);
        event.user_id = Some(tenant.user_id.clone());
        event.organization_id = Some(tenant.organization_id.clone());
        event
    }

    pub fn with_resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Values keep their JSON type (`42`, `false`), not a string rendering.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<(), ApplicationError>;
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), ApplicationError> {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{
        audit::{AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink, CONVERSATION_MESSAGE},
        domain::tenant::{OrganizationId, TenantContext, UserId},
    };

    #[tokio::test]
    async fn in_memory_sink_records_events_with_tenant_fields() {
        let sink = InMemoryAuditSink::default();
        let tenant = TenantContext::new(
            UserId("user-7".to_owned()),
            OrganizationId("org-3".to_owned()),
            "req-123",
        );

        sink.record(
            AuditEvent::for_tenant(
                &tenant,
                CONVERSATION_MESSAGE,
                "conversations",
                AuditOutcome::Success,
            )
            .with_resource("conv-1")
            .with_detail("message_length", 42)
            .with_detail("has_error", false),
        )
        .await
        .expect("record");

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].correlation_id, "req-123");
        assert_eq!(events[0].user_id.as_ref().map(|id| id.0.as_str()), Some("user-7"));
        assert_eq!(events[0].organization_id.as_ref().map(|id| id.0.as_str()), Some("org-3"));
        assert_eq!(events[0].resource_id.as_deref(), Some("conv-1"));
        assert_eq!(events[0].details.get("message_length"), Some(&json!(42)));
        assert_eq!(events[0].details.get("has_error"), Some(&json!(false)));
    }
}
