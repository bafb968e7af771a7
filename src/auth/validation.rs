//! Request validation and normalization for the auth endpoints.

use crate::error::AppError;

const MAX_NAME_LENGTH: usize = 100;
const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;
const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321 SMTP limit

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigninInput {
    pub email: String,
    pub password: String,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<String, AppError> {
    let email = normalize_email(email);
    if email.is_empty() || email.len() > MAX_EMAIL_LENGTH {
        return Err(AppError::ValidationError("Email is required".into()));
    }

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(AppError::ValidationError("Email address is invalid".into()));
    }
    Ok(email)
}

pub fn validate_signup(name: &str, email: &str, password: &str) -> Result<SignupInput, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::ValidationError("Name is required".into()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(AppError::ValidationError(format!(
            "Name must be at most {} characters",
            MAX_NAME_LENGTH
        )));
    }

    let email = validate_email(email)?;

    let length = password.chars().count();
    if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&length) {
        return Err(AppError::ValidationError(format!(
            "Password must be between {} and {} characters",
            MIN_PASSWORD_LENGTH, MAX_PASSWORD_LENGTH
        )));
    }

    Ok(SignupInput {
        name: name.to_string(),
        email,
        password: password.to_string(),
    })
}

pub fn validate_signin(email: &str, password: &str) -> Result<SigninInput, AppError> {
    let email = validate_email(email)?;
    if password.is_empty() {
        return Err(AppError::ValidationError("Password is required".into()));
    }
    Ok(SigninInput {
        email,
        password: password.to_string(),
    })
}
