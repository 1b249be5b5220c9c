pub mod password;
pub mod session;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::access::{AccessError, AccessStore};
use crate::config::SecurityConfig;

pub use session::{SessionError, SessionGrant, SessionService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_id: Option<i32>,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Revocation counter the user had when this token was issued.
    pub ver: i64,
    pub typ: TokenType,
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// What the token service needs to know about a user to mint credentials.
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub user_id: Uuid,
    pub roles: Vec<String>,
    pub token_version: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("JWT secret not configured")]
    InvalidSecret,

    #[error("JWT generation error: {0}")]
    Generation(String),

    #[error("Invalid JWT token: {0}")]
    Invalid(String),

    #[error("Token type not accepted here")]
    WrongType,

    #[error("Token has been revoked")]
    Revoked,

    #[error(transparent)]
    Store(#[from] AccessError),
}

#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl TokenSettings {
    pub fn new(secret: impl Into<String>, access_ttl_hours: i64, refresh_ttl_days: i64) -> Self {
        Self {
            secret: secret.into(),
            access_ttl: Duration::hours(access_ttl_hours),
            refresh_ttl: Duration::days(refresh_ttl_days),
        }
    }

    pub fn from_config(security: &SecurityConfig) -> Self {
        Self::new(
            security.jwt_secret.clone(),
            security.jwt_expiry_hours as i64,
            security.refresh_expiry_days as i64,
        )
    }
}

/// Issues, validates and revokes bearer credentials.
///
/// Revocation is a per-user counter: a token is valid only while the `ver`
/// it carries equals the user's current counter, read from the store on
/// every validation.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    settings: TokenSettings,
    store: Arc<dyn AccessStore>,
}

impl TokenService {
    pub fn new(settings: TokenSettings, store: Arc<dyn AccessStore>) -> Result<Self, TokenError> {
        if settings.secret.is_empty() {
            return Err(TokenError::InvalidSecret);
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(settings.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.secret.as_bytes()),
            settings,
            store,
        })
    }

    pub fn issue(&self, subject: &TokenSubject, region_id: Option<i32>) -> Result<IssuedToken, TokenError> {
        self.mint(subject, region_id, TokenType::Access, self.settings.access_ttl)
    }

    pub fn issue_refresh(&self, subject: &TokenSubject) -> Result<IssuedToken, TokenError> {
        self.mint(subject, None, TokenType::Refresh, self.settings.refresh_ttl)
    }

    /// Full validation of an access token, including revocation.
    pub async fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_typed(token, TokenType::Access).await
    }

    pub async fn validate_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_typed(token, TokenType::Refresh).await
    }

    pub async fn revoke(&self, user_id: Uuid) -> Result<(), TokenError> {
        match self.store.bump_token_version(user_id).await? {
            Some(version) => tracing::info!(user_id = %user_id, version, "Revoked outstanding credentials"),
            None => tracing::warn!(user_id = %user_id, "Revocation requested for unknown user"),
        }
        Ok(())
    }

    /// Reads a single claim from a signature-checked token.
    pub fn get_claim(&self, token: &str, name: &str) -> Option<Value> {
        decode::<serde_json::Map<String, Value>>(token, &self.decoding_key, &self.validation())
            .ok()
            .and_then(|data| data.claims.get(name).cloned())
    }

    /// Signature and expiry only; no revocation lookup.
    fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation())
            .map(|data| data.claims)
            .map_err(|e| TokenError::Invalid(e.to_string()))
    }

    async fn validate_typed(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let claims = self.decode(token)?;
        if claims.typ != expected {
            return Err(TokenError::WrongType);
        }
        match self.store.token_version(claims.sub).await? {
            Some(current) if current == claims.ver => Ok(claims),
            _ => Err(TokenError::Revoked),
        }
    }

    fn mint(
        &self,
        subject: &TokenSubject,
        region_id: Option<i32>,
        typ: TokenType,
        ttl: Duration,
    ) -> Result<IssuedToken, TokenError> {
        let now = Utc::now();
        let expires_at = now + ttl;
        let claims = Claims {
            sub: subject.user_id,
            region_id,
            roles: if typ == TokenType::Access { subject.roles.clone() } else { Vec::new() },
            ver: subject.token_version,
            typ,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Generation(e.to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation
    }
}
