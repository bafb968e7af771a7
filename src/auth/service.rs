use std::sync::Arc;

use tracing::{error, info, warn};

use crate::auth::identity::IdentityProvider;
use crate::auth::password::{CredentialHasher, HashError};
use crate::auth::token::{TokenClaim, TokenIssuer, TokenPair};
use crate::auth::validation::{normalize_email, SigninInput, SignupInput};
use crate::db::models::User;
use crate::db::store::UserStore;
use crate::error::{AccountKind, AppError, AuthError, DatabaseError};
use crate::Result;

/// Signup, signin, refresh and federated login on top of an injected user store.
pub struct CredentialService {
    store: Arc<dyn UserStore>,
    hasher: Arc<dyn CredentialHasher>,
    tokens: TokenIssuer,
    identity: Arc<dyn IdentityProvider>,
}

impl CredentialService {
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: Arc<dyn CredentialHasher>,
        tokens: TokenIssuer,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            store,
            hasher,
            tokens,
            identity,
        }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Register a local account. `input.email` is expected to be normalized already.
    pub async fn signup(&self, input: SignupInput) -> Result<TokenPair> {
        if let Some(existing) = self.store.find_by_email(&input.email).await? {
            let kind = if existing.local_password_hash().is_some() {
                AccountKind::Local
            } else {
                AccountKind::Federated
            };
            warn!(user_id = %existing.id, ?kind, "Signup rejected, email already registered");
            return Err(AuthError::AlreadyExists(kind).into());
        }

        let password_hash = self.hash_password(input.password).await?;

        let user = match self
            .store
            .create_local(&input.name, &input.email, &password_hash)
            .await
        {
            Ok(Some(user)) => user,
            Ok(None) => return Err(DatabaseError::NotCreated.into()),
            Err(DatabaseError::Duplicate) => {
                warn!("Signup lost a race on a unique email");
                return Err(AuthError::AlreadyExists(AccountKind::Local).into());
            }
            Err(e) => return Err(e.into()),
        };

        info!(user_id = %user.id, "User signed up");
        self.issue_for(&user)
    }

    pub async fn signin(&self, input: SigninInput) -> Result<TokenPair> {
        let user = self
            .store
            .find_by_email(&input.email)
            .await?
            .ok_or(AuthError::NotFound)?;

        let Some(stored) = user.local_password_hash().map(str::to_owned) else {
            warn!(user_id = %user.id, "Password signin attempted on a federated account");
            return Err(AuthError::CredentialMismatch.into());
        };

        if !self.verify_password(input.password, stored).await? {
            warn!(user_id = %user.id, "Password mismatch");
            return Err(AuthError::CredentialMismatch.into());
        }

        info!(user_id = %user.id, "User signed in");
        self.issue_for(&user)
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let claim = self.tokens.verify_refresh(refresh_token)?;
        info!(user_id = %claim.id, "Token pair refreshed");
        self.tokens.issue(&claim)
    }

    /// Sign in with an OAuth provider token, creating a federated account on first use.
    pub async fn authenticate_federated(&self, provider_token: &str) -> Result<TokenPair> {
        let identity = self.identity.resolve_federated_identity(provider_token).await?;
        let email = normalize_email(&identity.email);

        if let Some(user) = self.store.find_by_email(&email).await? {
            info!(user_id = %user.id, "Federated signin for existing user");
            return self.issue_for(&user);
        }

        let user = match self.store.create_federated(&identity.name, &email).await {
            Ok(user) => user,
            Err(DatabaseError::Duplicate) => self
                .store
                .find_by_email(&email)
                .await?
                .ok_or(DatabaseError::NotCreated)?,
            Err(e) => return Err(e.into()),
        };

        info!(user_id = %user.id, "Federated user created");
        self.issue_for(&user)
    }

    /// Resolve an access token into the identity it was issued for.
    pub fn authenticate(&self, access_token: &str) -> Result<TokenClaim> {
        Ok(self.tokens.verify_access(access_token)?)
    }

    fn issue_for(&self, user: &User) -> Result<TokenPair> {
        self.tokens.issue(&TokenClaim {
            id: user.id,
            name: user.name.clone(),
        })
    }

    // Key derivation is CPU bound, keep it off the async workers.
    async fn hash_password(&self, password: String) -> Result<String> {
        let hasher = Arc::clone(&self.hasher);
        let hashed = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| HashError::Derivation(e.to_string()))
            .and_then(|result| result);

        hashed.map_err(|e| {
            error!(error = %e, "Password hashing failed");
            AppError::from(AuthError::from(e))
        })
    }

    async fn verify_password(&self, password: String, stored: String) -> Result<bool> {
        let hasher = Arc::clone(&self.hasher);
        let verified = tokio::task::spawn_blocking(move || hasher.verify(&password, &stored))
            .await
            .map_err(|e| HashError::Derivation(e.to_string()))
            .and_then(|result| result);

        verified.map_err(|e| {
            error!(error = %e, "Password verification failed");
            AppError::from(AuthError::from(e))
        })
    }
}
