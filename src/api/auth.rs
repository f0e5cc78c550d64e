use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use validator::Validate;

use super::extractors::{authorization_header, Principal};
use super::response;
use crate::error::AppError;
use crate::logging::mask;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
}

pub async fn register(
    req: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    req.validate()?;
    info!("Received registration request for email: {}", mask(&req.email, "**"));

    match state.auth.register(&req.name, &req.email, &req.password).await {
        Ok(user) => Ok(response::created(user.snapshot())),
        Err(e) => {
            error!("Registration failed for email: {}: {}", mask(&req.email, "**"), e);
            Err(e.into())
        }
    }
}

pub async fn login(
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    req.validate()?;

    let pair = state.auth.attempt_login(&req.email, &req.password).await?;
    Ok(response::ok(pair))
}

pub async fn logout(
    principal: Principal,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.auth.logout(&principal.id.to_string()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Takes the refresh token in the `Authorization` header.
pub async fn refresh(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let header = authorization_header(&req);
    let access_token = state.auth.refresh_access(header.as_deref()).await.map_err(|e| {
        info!("Refresh rejected: {}", e);
        e
    })?;

    Ok(response::ok(AccessTokenResponse { access_token }))
}

pub async fn me(principal: Principal) -> Result<HttpResponse, AppError> {
    Ok(response::ok(principal.0))
}
