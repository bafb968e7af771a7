use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::token::TokenClaim;
use crate::auth::validation::{validate_signin, validate_signup};
use crate::error::{AppError, AuthError};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct OAuthRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: Uuid,
    pub name: String,
}

/// Mount the auth routes under `/api/auth`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::ValidationError(err.to_string()).into()),
    )
    .service(
        web::scope("/api/auth")
            .route("/signup", web::post().to(signup))
            .route("/signin", web::post().to(signin))
            .route("/refresh", web::post().to(refresh))
            .route("/oauth", web::post().to(oauth))
            .route("/me", web::get().to(me)),
    );
}

pub async fn signup(
    req: web::Json<SignupRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let req = req.into_inner();
    let input = validate_signup(&req.name, &req.email, &req.password)?;
    info!("Received signup request for email: {}", input.email);

    let email = input.email.clone();
    match state.credentials.signup(input).await {
        Ok(tokens) => {
            info!("Signup successful for email: {}", email);
            Ok(HttpResponse::Created().json(tokens))
        }
        Err(e) => {
            warn!("Signup failed for email: {}: {}", email, e);
            Err(e)
        }
    }
}

pub async fn signin(
    req: web::Json<SigninRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let input = validate_signin(&req.email, &req.password)?;
    info!("Received signin request for email: {}", input.email);

    let email = input.email.clone();
    match state.credentials.signin(input).await {
        Ok(tokens) => {
            info!("Signin successful for email: {}", email);
            Ok(HttpResponse::Ok().json(tokens))
        }
        Err(e) => {
            warn!("Signin failed for email: {}: {}", email, e);
            Err(e)
        }
    }
}

pub async fn refresh(
    req: web::Json<RefreshRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let tokens = state.credentials.refresh(&req.refresh_token).await?;
    Ok(HttpResponse::Ok().json(tokens))
}

pub async fn oauth(
    req: web::Json<OAuthRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if req.token.trim().is_empty() {
        return Err(AppError::ValidationError("Provider token is required".into()));
    }

    match state.credentials.authenticate_federated(req.token.trim()).await {
        Ok(tokens) => Ok(HttpResponse::Ok().json(tokens)),
        Err(e) => {
            warn!("Federated signin failed: {}", e);
            Err(e)
        }
    }
}

pub async fn me(user: AuthenticatedUser) -> HttpResponse {
    let TokenClaim { id, name } = user.0;
    HttpResponse::Ok().json(MeResponse { id, name })
}

/// Identity of a request carrying a valid `Authorization: Bearer <access token>` header.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub TokenClaim);

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate_request(req))
    }
}

fn authenticate_request(req: &HttpRequest) -> Result<AuthenticatedUser, AppError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::TokenInvalid)?;

    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| AppError::InternalError("application state is not configured".into()))?;

    state.credentials.authenticate(token).map(AuthenticatedUser)
}
