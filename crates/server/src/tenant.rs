use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};
use tracing::debug;
use uuid::Uuid;

use medvoice_core::{TenantContext, UserId};

use crate::error::ApiError;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Caller resolved from `x-user-id` to its organization.
#[derive(Clone, Debug)]
pub struct Tenant(pub TenantContext);

impl FromRequestParts<AppState> for Tenant {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let correlation_id = correlation_id(&parts.headers);
        let user_id = header_value(&parts.headers, USER_ID_HEADER).ok_or_else(|| {
            ApiError::new(StatusCode::UNAUTHORIZED, "Missing x-user-id header", &correlation_id)
        })?;

        let user_id = UserId(user_id);
        let organization_id = state
            .tenants
            .organization_for_user(&user_id)
            .await
            .map_err(|error| ApiError::repository(error, &correlation_id))?
            .ok_or_else(|| {
                ApiError::new(
                    StatusCode::FORBIDDEN,
                    "User is not assigned to an organization",
                    &correlation_id,
                )
            })?;

        debug!(
            event_name = "api.tenant.resolved",
            correlation_id = %correlation_id,
            organization_id = %organization_id.0,
            "resolved caller organization"
        );
        Ok(Tenant(TenantContext::new(user_id, organization_id, correlation_id)))
    }
}

pub fn correlation_id(headers: &HeaderMap) -> String {
    header_value(headers, REQUEST_ID_HEADER).unwrap_or_else(|| format!("req-{}", Uuid::new_v4()))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use axum::{
        extract::FromRequestParts,
        http::{HeaderMap, HeaderValue, Request, StatusCode},
    };

    use medvoice_db::seed::{DEMO_ORGANIZATION_ID, DEMO_USER_ID};

    use super::{correlation_id, Tenant, REQUEST_ID_HEADER};
    use crate::test_support::test_state;

    async fn resolve(user: Option<&str>) -> Result<Tenant, crate::error::ApiError> {
        let state = test_state().await;
        let mut request = Request::builder().uri("/api/conversations").header(REQUEST_ID_HEADER, "req-42");
        if let Some(user) = user {
            request = request.header("x-user-id", user);
        }
        let (mut parts, _) = request.body(()).expect("request").into_parts();
        Tenant::from_request_parts(&mut parts, &state).await
    }

    #[tokio::test]
    async fn known_user_resolves_to_organization() {
        let Tenant(tenant) = resolve(Some(DEMO_USER_ID)).await.expect("tenant");
        assert_eq!(tenant.organization_id.0, DEMO_ORGANIZATION_ID);
        assert_eq!(tenant.correlation_id, "req-42");
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let error = resolve(None).await.expect_err("no header");
        assert_eq!(error.status, StatusCode::UNAUTHORIZED);
        assert_eq!(error.body.correlation_id, "req-42");
    }

    #[tokio::test]
    async fn unknown_user_is_forbidden() {
        let error = resolve(Some("user-nobody")).await.expect_err("unknown user");
        assert_eq!(error.status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn correlation_id_is_generated_when_absent() {
        let mut headers = HeaderMap::new();
        assert!(correlation_id(&headers).starts_with("req-"));

        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("  trace-1 "));
        assert_eq!(correlation_id(&headers), "trace-1");
    }
}
