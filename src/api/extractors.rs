use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use std::ops::Deref;
use tracing::info;

use crate::auth::SessionRole;
use crate::db::UserSnapshot;
use crate::error::AppError;
use crate::AppState;

pub fn authorization_header(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
}

pub(crate) fn app_state(req: &HttpRequest) -> Result<web::Data<AppState>, AppError> {
    req.app_data::<web::Data<AppState>>()
        .cloned()
        .ok_or_else(|| AppError::InternalError("application state not registered".into()))
}

/// The user behind a valid access token with a live session. Taking this as
/// a handler argument puts the route behind the gate.
#[derive(Debug, Clone)]
pub struct Principal(pub UserSnapshot);

impl Deref for Principal {
    type Target = UserSnapshot;

    fn deref(&self) -> &UserSnapshot {
        &self.0
    }
}

impl FromRequest for Principal {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let state = app_state(req);
        let header = authorization_header(req);
        let path = req.path().to_string();

        Box::pin(async move {
            let state = state?;
            match state.auth.authenticate(header.as_deref(), SessionRole::Access).await {
                Ok(snapshot) => Ok(Principal(snapshot)),
                Err(e) => {
                    info!("Rejected request to {}: {}", path, e);
                    Err(e.into())
                }
            }
        })
    }
}
