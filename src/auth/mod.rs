pub mod session;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub use session::{JwtSessionProvider, Session, SessionError, SessionProvider};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Acting user id
    pub sub: String,
    pub tenant_id: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(actor_id: impl Into<String>, tenant_id: impl Into<String>, roles: Vec<String>, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: actor_id.into(),
            tenant_id: tenant_id.into(),
            roles,
            iat: now.timestamp(),
            exp,
        }
    }
}

/// Sign claims with HS256
pub fn issue_token(secret: &str, claims: &Claims) -> Result<String, SessionError> {
    if secret.is_empty() {
        return Err(SessionError::NotConfigured);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key).map_err(|e| SessionError::InvalidToken(e.to_string()))
}

/// Verify signature and expiry, returning the claims
pub fn decode_token(secret: &str, token: &str) -> Result<Claims, SessionError> {
    if secret.is_empty() {
        return Err(SessionError::NotConfigured);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let token_data = decode::<Claims>(token, &decoding_key, &Validation::default())
        .map_err(|e| SessionError::InvalidToken(e.to_string()))?;

    Ok(token_data.claims)
}
