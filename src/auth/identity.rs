use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::warn;

use crate::config::OAuthConfig;
use crate::error::AuthError;

/// Who the OAuth provider says the bearer of a token is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedIdentity {
    pub email: String,
    pub name: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve_federated_identity(
        &self,
        provider_token: &str,
    ) -> Result<FederatedIdentity, AuthError>;
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
}

/// Resolves provider access tokens through an OpenID Connect userinfo endpoint.
pub struct OAuthIdentityProvider {
    client: reqwest::Client,
    userinfo_url: String,
}

impl OAuthIdentityProvider {
    pub fn new(config: &OAuthConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AuthError::IdentityProvider(e.to_string()))?;

        Ok(Self {
            client,
            userinfo_url: config.userinfo_url.clone(),
        })
    }
}

#[async_trait]
impl IdentityProvider for OAuthIdentityProvider {
    async fn resolve_federated_identity(
        &self,
        provider_token: &str,
    ) -> Result<FederatedIdentity, AuthError> {
        let res = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(provider_token)
            .send()
            .await
            .map_err(|e| AuthError::IdentityProvider(e.to_string()))?;

        match res.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!("Identity provider rejected the supplied token");
                return Err(AuthError::TokenInvalid);
            }
            status => {
                return Err(AuthError::IdentityProvider(format!(
                    "userinfo endpoint returned {}",
                    status
                )));
            }
        }

        let info: UserInfo = res
            .json()
            .await
            .map_err(|e| AuthError::IdentityProvider(format!("invalid userinfo response: {}", e)))?;

        if info.email_verified == Some(false) {
            warn!("Identity provider reports an unverified email");
            return Err(AuthError::TokenInvalid);
        }

        let email = info
            .email
            .filter(|email| !email.trim().is_empty())
            .ok_or_else(|| AuthError::IdentityProvider("userinfo response has no email".into()))?;

        let name = info
            .name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

        Ok(FederatedIdentity { email, name })
    }
}
