use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "auth_provider", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Local,
    Federated,
}

/// A registered account. Local accounts always carry a password hash, federated ones never do.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub provider: AuthProvider,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new_local(name: String, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash: Some(password_hash),
            provider: AuthProvider::Local,
            created_at: Utc::now(),
        }
    }

    pub fn new_federated(name: String, email: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash: None,
            provider: AuthProvider::Federated,
            created_at: Utc::now(),
        }
    }

    /// The stored hash, only if this is a well-formed local account.
    pub fn local_password_hash(&self) -> Option<&str> {
        match self.provider {
            AuthProvider::Local => self.password_hash.as_deref(),
            AuthProvider::Federated => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_uphold_provider_invariant() {
        let local = User::new_local("Ada".into(), "ada@x.com".into(), "hash".into());
        assert_eq!(local.provider, AuthProvider::Local);
        assert_eq!(local.local_password_hash(), Some("hash"));

        let federated = User::new_federated("Ada".into(), "ada@x.com".into());
        assert_eq!(federated.provider, AuthProvider::Federated);
        assert!(federated.password_hash.is_none());
        assert_eq!(federated.local_password_hash(), None);
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let user = User::new_local("Ada".into(), "ada@x.com".into(), "secret-hash".into());
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("\"provider\":\"local\""));
    }
}
