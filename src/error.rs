use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Which kind of account already owns an email address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    Local,
    Federated,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{}", already_exists_message(.0))]
    AlreadyExists(AccountKind),

    #[error("User not found")]
    NotFound,

    #[error("Password does not match")]
    CredentialMismatch,

    #[error("Password hashing failed: {0}")]
    HashingFailure(String),

    #[error("Invalid or expired token")]
    TokenInvalid,

    #[error("Identity provider error: {0}")]
    IdentityProvider(String),
}

fn already_exists_message(kind: &AccountKind) -> &'static str {
    match kind {
        AccountKind::Local => "User already exists, sign in with your password",
        AccountKind::Federated => "User already exists, sign in with your OAuth provider",
    }
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record")]
    Duplicate,

    #[error("Unable to create user")]
    NotCreated,
}

/// SQLSTATE raised by PostgreSQL on a unique constraint violation.
const PG_UNIQUE_VIOLATION: &str = "23505";

// Driver errors are translated here and nowhere else.
impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound,
            sqlx::Error::Database(ref db_err)
                if db_err.code().as_deref() == Some(PG_UNIQUE_VIOLATION) =>
            {
                DatabaseError::Duplicate
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionError(err.to_string())
            }
            _ => DatabaseError::QueryError(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::MigrationError(err.to_string())
    }
}

impl AppError {
    /// Stable machine-readable code sent to clients alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::AuthError(e) => match e {
                AuthError::AlreadyExists(AccountKind::Local) => "ALREADY_EXISTS_LOCAL",
                AuthError::AlreadyExists(AccountKind::Federated) => "ALREADY_EXISTS_FEDERATED",
                AuthError::NotFound => "USER_NOT_FOUND",
                AuthError::CredentialMismatch => "CREDENTIAL_MISMATCH",
                AuthError::HashingFailure(_) => "HASHING_FAILURE",
                AuthError::TokenInvalid => "TOKEN_INVALID",
                AuthError::IdentityProvider(_) => "IDENTITY_PROVIDER_FAILURE",
            },
            AppError::DatabaseError(_) => "PERSISTENCE_FAILURE",
            AppError::ValidationError(_) => "VALIDATION_FAILED",
            AppError::ConfigError(_) => "CONFIGURATION_ERROR",
            AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to hand to a client. Server-side failures never leak their detail.
    pub fn public_message(&self) -> String {
        match self {
            AppError::AuthError(AuthError::HashingFailure(_)) => {
                "Unable to process credentials, try again later".to_string()
            }
            AppError::AuthError(AuthError::IdentityProvider(_)) => {
                "Unable to verify identity with the OAuth provider".to_string()
            }
            AppError::DatabaseError(DatabaseError::NotCreated) => {
                "Unable to create user".to_string()
            }
            AppError::DatabaseError(_) => "A storage error occurred".to_string(),
            AppError::ConfigError(_) | AppError::InternalError(_) => {
                "Internal server error".to_string()
            }
            AppError::AuthError(e) => e.to_string(),
            AppError::ValidationError(msg) => msg.clone(),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        }
        let response = json!({
            "error": {
                "status": status.as_u16(),
                "code": self.code(),
                "message": self.public_message()
            }
        });
        HttpResponse::build(status).json(response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthError(e) => match e {
                AuthError::AlreadyExists(_) => StatusCode::CONFLICT,
                AuthError::NotFound => StatusCode::NOT_FOUND,
                AuthError::CredentialMismatch => StatusCode::UNAUTHORIZED,
                AuthError::TokenInvalid => StatusCode::UNAUTHORIZED,
                AuthError::HashingFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
                AuthError::IdentityProvider(_) => StatusCode::BAD_GATEWAY,
            },
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
