//! Authentication module for the Quill account service
//!
//! This module handles password hashing, token issuance,
//! federated identity resolution and the HTTP handlers built on them.

pub mod handlers;
pub mod identity;
pub mod password;
mod service;
pub mod token;
pub mod validation;

pub use identity::{FederatedIdentity, IdentityProvider, OAuthIdentityProvider};
pub use password::{CredentialHasher, HashError, Pbkdf2Hasher};
pub use service::CredentialService;
pub use token::{TokenClaim, TokenIssuer, TokenPair};
