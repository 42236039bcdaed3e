use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::auth::Identity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub validity_hours: i64,
    pub leeway_seconds: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            validity_hours: 8,
            leeway_seconds: 0,
        }
    }
}

/// Claims carried by a helpdesk credential. `branch_id` is optional because
/// the issuing flow does not always know it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: i32,
    pub email: String,
    pub role: String,
    pub organization_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<i32>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn for_identity(identity: &Identity, validity: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: identity.user_id(),
            email: identity.email().to_string(),
            role: identity.role().as_str().to_string(),
            organization_id: identity.organization_id().to_string(),
            branch_id: identity.branch_id(),
            iat: now.timestamp(),
            exp: (now + validity).timestamp(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl JwtManager {
    pub fn new(config: JwtConfig, secret: &str) -> Result<Self> {
        if secret.len() < 32 {
            return Err(anyhow!("JWT secret must be at least 32 characters"));
        }
        Ok(Self {
            config,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    pub fn from_secret(secret: &str) -> Result<Self> {
        Self::new(JwtConfig::default(), secret)
    }

    /// Signs a credential for `identity`, valid for the configured window.
    pub fn issue(&self, identity: &Identity) -> Result<String> {
        let claims = Claims::for_identity(identity, Duration::hours(self.config.validity_hours));
        self.encode_claims(&claims)
    }

    pub fn encode_claims(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| anyhow!("Failed to encode token: {e}"))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.config.leeway_seconds;
        validation.validate_aud = false;

        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| anyhow!("Token validation failed: {e}"))?;
        debug!(
            "Token verified for user {} in organization {}",
            data.claims.id, data.claims.organization_id
        );
        Ok(data.claims)
    }
}

pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
