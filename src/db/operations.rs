use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::db::models::User;
use crate::db::store::UserStore;
use crate::error::DatabaseError;

const USER_COLUMNS: &str = "id, name, email, password_hash, provider, created_at";

pub struct DbOperations {
    pool: Arc<PgPool>,
}

impl DbOperations {
    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        Self::new_with_options(
            &config.url,
            config.max_connections,
            Duration::from_secs(config.acquire_timeout_secs),
        )
        .await
    }

    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await?;
        info!("Database migrations applied");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn insert_user(&self, user: &User) -> Result<Option<User>, DatabaseError> {
        let query = format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {USER_COLUMNS}"
        );
        let created = sqlx::query_as::<_, User>(&query)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.provider)
            .bind(user.created_at)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(created)
    }
}

#[async_trait]
impl UserStore for DbOperations {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    async fn create_local(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<User>, DatabaseError> {
        let user = User::new_local(name.to_string(), email.to_string(), password_hash.to_string());
        self.insert_user(&user).await
    }

    async fn create_federated(&self, name: &str, email: &str) -> Result<User, DatabaseError> {
        let user = User::new_federated(name.to_string(), email.to_string());
        self.insert_user(&user).await?.ok_or(DatabaseError::NotCreated)
    }
}
