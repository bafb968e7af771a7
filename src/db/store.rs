use async_trait::async_trait;

use crate::db::models::User;
use crate::error::DatabaseError;

/// Persistence contract for user accounts.
///
/// Implementations translate their driver's failures into [`DatabaseError`] before
/// returning; a unique email violation must come back as [`DatabaseError::Duplicate`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;

    /// Insert a local account. `None` means the store accepted the write but returned no row.
    async fn create_local(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<User>, DatabaseError>;

    async fn create_federated(&self, name: &str, email: &str) -> Result<User, DatabaseError>;
}
