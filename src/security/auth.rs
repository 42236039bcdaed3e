use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use super::jwt::{extract_bearer_token, JwtManager};
use crate::core::shared::error::{HelpdeskError, HelpdeskResult};
use crate::core::shared::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Employee,
    Agent,
    Lead,
    BranchManager,
    Manager,
    GlobalAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Employee => "Employee",
            Self::Agent => "Agent",
            Self::Lead => "Lead",
            Self::BranchManager => "BranchManager",
            Self::Manager => "Manager",
            Self::GlobalAdmin => "GlobalAdmin",
        }
    }

    /// Roles whose ticket listing is limited to their own branch.
    pub fn is_branch_scoped(&self) -> bool {
        matches!(self, Self::Agent | Self::Lead | Self::BranchManager)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Employee" => Ok(Self::Employee),
            "Agent" => Ok(Self::Agent),
            "Lead" => Ok(Self::Lead),
            "BranchManager" => Ok(Self::BranchManager),
            "Manager" => Ok(Self::Manager),
            "GlobalAdmin" => Ok(Self::GlobalAdmin),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

/// Roles allowed to read report summaries.
pub const REPORT_ROLES: &[Role] = &[Role::GlobalAdmin, Role::Manager, Role::BranchManager];

/// The authenticated caller. Built once per request from a verified
/// credential and passed explicitly to every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    user_id: i32,
    email: String,
    role: Role,
    organization_id: String,
    branch_id: Option<i32>,
}

impl Identity {
    pub fn new(
        user_id: i32,
        email: impl Into<String>,
        role: Role,
        organization_id: impl Into<String>,
        branch_id: Option<i32>,
    ) -> Self {
        Self {
            user_id,
            email: email.into(),
            role,
            organization_id: organization_id.into(),
            branch_id,
        }
    }

    pub fn user_id(&self) -> i32 {
        self.user_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }

    pub fn branch_id(&self) -> Option<i32> {
        self.branch_id
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }
}

/// Resolves bearer credentials into an [`Identity`].
#[derive(Debug, Clone)]
pub struct TenantContext {
    jwt: Arc<JwtManager>,
}

impl TenantContext {
    pub fn new(jwt: Arc<JwtManager>) -> Self {
        Self { jwt }
    }

    pub fn jwt(&self) -> &JwtManager {
        &self.jwt
    }

    /// Resolves the value of an `Authorization` header.
    pub fn resolve(&self, authorization: Option<&str>) -> HelpdeskResult<Identity> {
        let header = authorization
            .ok_or_else(|| HelpdeskError::Authentication("No token provided".to_string()))?;
        let token = extract_bearer_token(header)
            .ok_or_else(|| HelpdeskError::Authentication("Malformed authorization header".to_string()))?;
        self.resolve_token(token)
    }

    pub fn resolve_token(&self, token: &str) -> HelpdeskResult<Identity> {
        let claims = self.jwt.validate_token(token).map_err(|e| {
            debug!("Credential rejected: {e}");
            HelpdeskError::Authentication("Unauthorized".to_string())
        })?;

        let role = claims.role.parse::<Role>().map_err(|e| {
            debug!("Credential rejected: {e}");
            HelpdeskError::Authentication("Unauthorized".to_string())
        })?;

        if claims.organization_id.trim().is_empty() {
            debug!("Credential rejected: empty organization id");
            return Err(HelpdeskError::Authentication("Unauthorized".to_string()));
        }

        Ok(Identity::new(
            claims.id,
            claims.email,
            role,
            claims.organization_id,
            claims.branch_id,
        ))
    }
}

/// Fails with `Authorization` when the caller's role is not in `allowed`.
pub fn authorize(identity: &Identity, allowed: &[Role]) -> HelpdeskResult<()> {
    if identity.has_any_role(allowed) {
        return Ok(());
    }
    warn!(
        "Access denied for role {} (user {}, organization {})",
        identity.role(),
        identity.user_id(),
        identity.organization_id()
    );
    Err(HelpdeskError::Authorization("Access denied".to_string()))
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for Identity {
    type Rejection = HelpdeskError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        state.tenant.resolve(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::jwt::Claims;
    use chrono::Duration;

    fn tenant() -> TenantContext {
        let jwt = JwtManager::from_secret("this-is-a-very-long-secret-key-for-testing-purposes-only")
            .expect("Failed to create manager");
        TenantContext::new(Arc::new(jwt))
    }

    fn employee() -> Identity {
        Identity::new(42, "employee@demo.test", Role::Employee, "demo", Some(5))
    }

    #[test]
    fn test_resolve_round_trip() {
        let tenant = tenant();
        let token = tenant.jwt().issue(&employee()).expect("issue");

        let identity = tenant
            .resolve(Some(&format!("Bearer {token}")))
            .expect("resolve");
        assert_eq!(identity, employee());
    }

    #[test]
    fn test_missing_header() {
        let err = tenant().resolve(None).unwrap_err();
        assert!(matches!(err, HelpdeskError::Authentication(_)));
    }

    #[test]
    fn test_wrong_scheme() {
        let err = tenant().resolve(Some("Basic dXNlcjpwYXNz")).unwrap_err();
        assert!(matches!(err, HelpdeskError::Authentication(_)));
    }

    #[test]
    fn test_garbage_token() {
        let err = tenant().resolve(Some("Bearer not-a-jwt")).unwrap_err();
        assert!(matches!(err, HelpdeskError::Authentication(_)));
    }

    #[test]
    fn test_unknown_role_rejected() {
        let tenant = tenant();
        let mut claims = Claims::for_identity(&employee(), Duration::hours(1));
        claims.role = "Superuser".to_string();
        let token = tenant.jwt().encode_claims(&claims).expect("encode");

        let err = tenant.resolve_token(&token).unwrap_err();
        assert!(matches!(err, HelpdeskError::Authentication(_)));
    }

    #[test]
    fn test_empty_organization_rejected() {
        let tenant = tenant();
        let mut claims = Claims::for_identity(&employee(), Duration::hours(1));
        claims.organization_id = String::new();
        let token = tenant.jwt().encode_claims(&claims).expect("encode");

        assert!(tenant.resolve_token(&token).is_err());
    }

    #[test]
    fn test_authorize() {
        let admin = Identity::new(1, "a@demo.test", Role::GlobalAdmin, "demo", None);
        assert!(authorize(&admin, REPORT_ROLES).is_ok());

        let err = authorize(&employee(), REPORT_ROLES).unwrap_err();
        assert!(matches!(err, HelpdeskError::Authorization(_)));
    }

    #[test]
    fn test_role_parsing() {
        for role in [
            Role::Employee,
            Role::Agent,
            Role::Lead,
            Role::BranchManager,
            Role::Manager,
            Role::GlobalAdmin,
        ] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("admin".parse::<Role>().is_err());
        assert!(Role::Lead.is_branch_scoped());
        assert!(!Role::Manager.is_branch_scoped());
    }
}
