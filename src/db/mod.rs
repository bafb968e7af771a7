//! Database module for the Quill account service
//!
//! This module handles database connections, migrations,
//! and the user store consumed by the credential service.

pub mod models;
pub mod operations;
pub mod store;

pub use models::{AuthProvider, User};
pub use operations::DbOperations;
pub use store::UserStore;
