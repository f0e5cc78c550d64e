//! HTTP surface. Handlers translate between JSON and the auth core; all
//! status-code decisions for failures live in [`crate::error::AppError`].

pub mod auth;
pub mod extractors;
pub mod health;
pub mod pagination;
pub mod request_log;
pub mod response;
pub mod users;

use actix_web::web;

use crate::error::AppError;

pub use extractors::Principal;

/// Registers every route plus body/query/path error handlers that answer in
/// the standard error format.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _| AppError::ValidationError(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _| AppError::ValidationError(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _| AppError::ValidationError(err.to_string()).into()),
    )
    .route("/health", web::get().to(crate::health_check))
    .service(
        web::scope("/api/v1")
            .route("/livez", web::get().to(health::livez))
            .route("/readyz", web::get().to(health::readyz))
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(auth::register))
                    .route("/login", web::post().to(auth::login))
                    .route("/logout", web::post().to(auth::logout))
                    .route("/refresh", web::post().to(auth::refresh))
                    .route("/me", web::get().to(auth::me)),
            )
            .service(
                web::scope("/users")
                    .route("", web::get().to(users::list_users))
                    .route("", web::post().to(users::create_user))
                    .route("/{id}", web::get().to(users::get_user))
                    .route("/{id}", web::patch().to(users::update_user))
                    .route("/{id}", web::delete().to(users::delete_user)),
            ),
    );
}
