//! Acting identity resolution.

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use thiserror::Error;

use super::{decode_token, issue_token, Claims};

/// Who is acting, on behalf of which tenant, with which roles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub actor_id: String,
    pub tenant_id: String,
    pub roles: Vec<String>,
}

impl From<Claims> for Session {
    fn from(claims: Claims) -> Self {
        Self {
            actor_id: claims.sub,
            tenant_id: claims.tenant_id,
            roles: claims.roles,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Missing Authorization header")]
    MissingHeader,

    #[error("Authorization header must use Bearer token format")]
    MalformedHeader,

    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),

    #[error("JWT secret not configured")]
    NotConfigured,
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Resolve the acting identity from request headers
    async fn resolve_session(&self, headers: &HeaderMap) -> Result<Session, SessionError>;
}

/// Bearer JWTs signed with a shared HS256 secret
pub struct JwtSessionProvider {
    secret: String,
    expiry_hours: u64,
}

impl JwtSessionProvider {
    pub fn new(secret: impl Into<String>, expiry_hours: u64) -> Self {
        Self {
            secret: secret.into(),
            expiry_hours,
        }
    }

    /// Mint a token for the given identity using this provider's secret and expiry
    pub fn issue(&self, actor_id: &str, tenant_id: &str, roles: Vec<String>) -> Result<String, SessionError> {
        issue_token(&self.secret, &Claims::new(actor_id, tenant_id, roles, self.expiry_hours))
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, SessionError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(SessionError::MissingHeader)?
        .to_str()
        .map_err(|_| SessionError::MalformedHeader)?;

    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(SessionError::MalformedHeader),
    }
}

#[async_trait]
impl SessionProvider for JwtSessionProvider {
    async fn resolve_session(&self, headers: &HeaderMap) -> Result<Session, SessionError> {
        let token = bearer_token(headers)?;
        let claims = decode_token(&self.secret, token)?;
        if claims.tenant_id.is_empty() {
            return Err(SessionError::InvalidToken("token carries no tenant".to_string()));
        }
        Ok(claims.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[tokio::test]
    async fn resolves_session_from_bearer_token() {
        let provider = JwtSessionProvider::new("secret", 1);
        let token = provider.issue("u1", "t1", vec!["hr-manager".into()]).unwrap();

        let session = provider
            .resolve_session(&headers(&format!("Bearer {}", token)))
            .await
            .unwrap();
        assert_eq!(
            session,
            Session {
                actor_id: "u1".into(),
                tenant_id: "t1".into(),
                roles: vec!["hr-manager".into()],
            }
        );
    }

    #[tokio::test]
    async fn rejects_missing_and_malformed_headers() {
        let provider = JwtSessionProvider::new("secret", 1);
        assert!(matches!(
            provider.resolve_session(&HeaderMap::new()).await,
            Err(SessionError::MissingHeader)
        ));
        assert!(matches!(
            provider.resolve_session(&headers("Basic abc")).await,
            Err(SessionError::MalformedHeader)
        ));
        assert!(matches!(
            provider.resolve_session(&headers("Bearer not-a-jwt")).await,
            Err(SessionError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn rejects_tokens_without_tenant() {
        let provider = JwtSessionProvider::new("secret", 1);
        let token = provider.issue("u1", "", vec![]).unwrap();
        assert!(provider
            .resolve_session(&headers(&format!("Bearer {}", token)))
            .await
            .is_err());
    }
}
