use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrganizationId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// The resolved caller of a single request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TenantContext {
    pub user_id: UserId,
    pub organization_id: OrganizationId,
    pub correlation_id: String,
}

impl TenantContext {
    pub fn new(
        user_id: UserId,
        organization_id: OrganizationId,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self { user_id, organization_id, correlation_id: correlation_id.into() }
    }
}
