pub mod auth;
pub mod cors;
pub mod jwt;

pub use auth::{authorize, Identity, Role, TenantContext, REPORT_ROLES};
pub use jwt::{extract_bearer_token, Claims, JwtConfig, JwtManager};
