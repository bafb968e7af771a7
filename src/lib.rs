pub mod auth;
pub mod config;
pub mod db;
pub mod error;

use actix_web::HttpResponse;
use std::sync::Arc;

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use crate::config::Settings;

pub use auth::{CredentialService, OAuthIdentityProvider, Pbkdf2Hasher, TokenIssuer, TokenPair};
pub use db::{DbOperations, User, UserStore};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all workers
#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<CredentialService>,
}

impl AppState {
    /// Wire the credential service from configuration around an already constructed store.
    pub fn new(config: &Settings, store: Arc<dyn UserStore>) -> Result<Self> {
        let hasher = Pbkdf2Hasher::new(config.auth.password_hash_iterations)
            .map_err(|e| AppError::ConfigError(e.to_string()))?;
        let tokens = TokenIssuer::from_config(&config.auth)?;
        let identity = OAuthIdentityProvider::new(&config.oauth)
            .map_err(|e| AppError::ConfigError(e.to_string()))?;

        let credentials =
            CredentialService::new(store, Arc::new(hasher), tokens, Arc::new(identity));

        Ok(Self {
            credentials: Arc::new(credentials),
        })
    }
}
