use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use quill_server::error::DatabaseError;
use quill_server::{AppState, Settings, User, UserStore};
use tokio::sync::RwLock;

/// User store backed by a map keyed on email, with the same uniqueness rule as the database.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, User>>,
    writes: AtomicUsize,
}

impl InMemoryUserStore {
    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.email.clone(), user);
    }

    pub async fn get(&self, email: &str) -> Option<User> {
        self.users.read().await.get(email).cloned()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    async fn insert_unique(&self, user: User) -> Result<User, DatabaseError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut users = self.users.write().await;
        if users.contains_key(&user.email) {
            return Err(DatabaseError::Duplicate);
        }
        users.insert(user.email.clone(), user.clone());
        Ok(user)
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        Ok(self.get(email).await)
    }

    async fn create_local(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<User>, DatabaseError> {
        let user = User::new_local(name.to_string(), email.to_string(), password_hash.to_string());
        self.insert_unique(user).await.map(Some)
    }

    async fn create_federated(&self, name: &str, email: &str) -> Result<User, DatabaseError> {
        self.insert_unique(User::new_federated(name.to_string(), email.to_string())).await
    }
}

pub fn test_state(settings: Settings) -> (AppState, Arc<InMemoryUserStore>) {
    let store = Arc::new(InMemoryUserStore::default());
    let state = AppState::new(&settings, store.clone()).expect("Failed to build app state");
    (state, store)
}
