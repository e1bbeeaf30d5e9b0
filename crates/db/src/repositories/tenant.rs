use medvoice_core::domain::tenant::{OrganizationId, UserId};

use super::{RepositoryError, TenantRepository};
use crate::DbPool;

pub struct SqlTenantRepository {
    pool: DbPool,
}

impl SqlTenantRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TenantRepository for SqlTenantRepository {
    async fn organization_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<OrganizationId>, RepositoryError> {
        let organization_id: Option<String> =
            sqlx::query_scalar("SELECT organization_id FROM users WHERE id = ?")
                .bind(&user_id.0)
                .fetch_optional(&self.pool)
                .await?;

        Ok(organization_id.map(OrganizationId))
    }
}
