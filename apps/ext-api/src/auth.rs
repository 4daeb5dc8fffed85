//! Bearer token authentication.
//!
//! Tokens are HS256 JWTs whose claims carry the permissions the caller
//! holds. Each module router is wrapped in [`require_permission`] with the
//! permission it needs:
//!
//! ```text
//! Authorization: Bearer <jwt>
//!        │
//!        ▼
//! require_permission ── no/invalid token ──► 401 UNAUTHORIZED
//!        │
//!        ├── permission missing ───────────► 403 FORBIDDEN
//!        ▼
//! handler (Claims in request extensions)
//! ```

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

/// Grants every permission.
pub const ALL_PERMISSIONS: &str = "*";

pub const HOOKS_DISPATCH: &str = "hooks.dispatch";
pub const SETTINGS_MANAGE: &str = "settings.manage";

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user or integration id)
    pub sub: String,

    /// Granted permissions, e.g. `containers.manage`
    pub permissions: Vec<String>,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

impl Claims {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .iter()
            .any(|p| p == permission || p == ALL_PERMISSIONS)
    }
}

/// JWT token manager.
pub struct JwtManager {
    secret: String,
    lifetime_secs: i64,
}

impl JwtManager {
    pub fn new(secret: impl Into<String>, lifetime_secs: i64) -> Self {
        JwtManager {
            secret: secret.into(),
            lifetime_secs,
        }
    }

    /// Issue a token for `subject` holding `permissions`.
    pub fn issue_token(&self, subject: &str, permissions: &[&str]) -> Result<String, ApiError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.lifetime_secs);

        let claims = Claims {
            sub: subject.to_string(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ApiError::internal(format!("Failed to generate token: {}", e)))
    }

    /// Validate and decode a token.
    pub fn validate_token(&self, token: &str) -> Result<Claims, ApiError> {
        let token_data: TokenData<Claims> = decode(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| ApiError::unauthorized(format!("Invalid token: {}", e)))?;

        Ok(token_data.claims)
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Middleware state: the token manager plus the permission a router needs.
#[derive(Clone)]
pub struct PermissionGuard {
    pub jwt: Arc<JwtManager>,
    pub permission: &'static str,
}

impl PermissionGuard {
    pub fn new(jwt: Arc<JwtManager>, permission: &'static str) -> Self {
        PermissionGuard { jwt, permission }
    }
}

/// Rejects requests without a valid token holding the guard's permission.
pub async fn require_permission(
    State(guard): State<PermissionGuard>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer_token)
        .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;

    let claims = guard.jwt.validate_token(token)?;

    if !claims.has_permission(guard.permission) {
        tracing::warn!(
            subject = %claims.sub,
            permission = guard.permission,
            "Permission denied"
        );
        return Err(ApiError::forbidden(guard.permission));
    }

    tracing::debug!(subject = %claims.sub, permission = guard.permission, "Authorized");
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test-secret", 3600);

        let token = manager
            .issue_token("pos-terminal", &["containers.manage"])
            .unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, "pos-terminal");
        assert!(claims.has_permission("containers.manage"));
        assert!(!claims.has_permission("loyalty.manage"));
    }

    #[test]
    fn test_wildcard_permission() {
        let manager = JwtManager::new("test-secret", 3600);
        let token = manager.issue_token("admin", &[ALL_PERMISSIONS]).unwrap();
        let claims = manager.validate_token(&token).unwrap();
        assert!(claims.has_permission(SETTINGS_MANAGE));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = JwtManager::new("secret-a", 3600);
        let verifier = JwtManager::new("secret-b", 3600);

        let token = issuer.issue_token("pos", &[HOOKS_DISPATCH]).unwrap();
        let err = verifier.validate_token(&token).unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);
    }

    #[test]
    fn test_expired_token_rejected() {
        // Default validation allows 60s leeway
        let manager = JwtManager::new("test-secret", -120);
        let token = manager.issue_token("pos", &[HOOKS_DISPATCH]).unwrap();
        assert!(manager.validate_token(&token).is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }
}
