use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AppError, AuthError};

/// Identity carried inside every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaim {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // User ID
    pub name: String, // Display name
    pub exp: i64,     // Expiration time
    pub iat: i64,     // Issued at
}

impl Claims {
    fn into_claim(self) -> Result<TokenClaim, AuthError> {
        let id = Uuid::parse_str(&self.sub).map_err(|_| AuthError::TokenInvalid)?;
        Ok(TokenClaim {
            id,
            name: self.name,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signs and checks HS256 access and refresh tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    access_secret: String,
    refresh_secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(
        access_secret: impl Into<String>,
        refresh_secret: impl Into<String>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, AppError> {
        let access_ttl = Duration::try_minutes(config.access_token_ttl_minutes).ok_or_else(|| {
            AppError::ConfigError("auth.access_token_ttl_minutes is out of range".into())
        })?;
        let refresh_ttl = Duration::try_days(config.refresh_token_ttl_days).ok_or_else(|| {
            AppError::ConfigError("auth.refresh_token_ttl_days is out of range".into())
        })?;

        Ok(Self::new(
            config.access_token_secret.clone(),
            config.refresh_token_secret.clone(),
            access_ttl,
            refresh_ttl,
        ))
    }

    pub fn issue(&self, claim: &TokenClaim) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: sign(claim, &self.access_secret, self.access_ttl)?,
            refresh_token: sign(claim, &self.refresh_secret, self.refresh_ttl)?,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<TokenClaim, AuthError> {
        verify(token, &self.access_secret)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<TokenClaim, AuthError> {
        verify(token, &self.refresh_secret)
    }
}

fn sign(claim: &TokenClaim, secret: &str, ttl: Duration) -> Result<String, AppError> {
    let now = Utc::now();
    let expires_at = now
        .checked_add_signed(ttl)
        .ok_or_else(|| AppError::InternalError("token expiry is out of range".into()))?;
    let claims = Claims {
        sub: claim.id.to_string(),
        name: claim.name.clone(),
        exp: expires_at.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalError(format!("token signing failed: {e}")))
}

/// Check signature and expiry of `token` against `secret`.
pub fn verify(token: &str, secret: &str) -> Result<TokenClaim, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|e| {
            debug!(reason = ?e.kind(), "token rejected");
            AuthError::TokenInvalid
        })?;

    data.claims.into_claim()
}
