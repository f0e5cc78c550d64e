use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use authgate_server::config::CorsConfig;
use authgate_server::api::{self, request_log};
use authgate_server::{logging, AppState, Settings};
use dotenv::dotenv;
use std::net::TcpListener;
use std::sync::Arc;
use tracing::{info, warn};

fn cors(config: &CorsConfig) -> Cors {
    if !config.enabled {
        // CORS disabled - use most restrictive settings
        return Cors::default();
    }

    let cors = if config.allow_any_origin {
        Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .expose_any_header()
    } else {
        config
            .allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE"])
            .allowed_headers(vec!["Authorization", "Content-Type", "X-Trace-Id"])
            .expose_headers(vec!["X-Trace-Id"])
            .supports_credentials()
    };

    cors.max_age(config.max_age as usize)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Load configuration
    let config = Settings::new().context("loading configuration")?;
    logging::init(&config.logging)?;
    info!("Configuration loaded for environment: {}", config.environment);

    if config.auth.jwt_secret == "development_secret" && config.environment != "development" {
        warn!("Running with the built-in development JWT secret");
    }

    // Initialize application state
    let state = AppState::new(config.clone())
        .await
        .context("connecting to backends")?;
    let state = web::Data::new(state);

    // Create and bind TCP listener
    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&address).with_context(|| format!("binding {}", address))?;
    info!("Starting server at {}", address);

    let cors_config = config.cors.clone();
    let mask_fields = Arc::new(config.logging.mask_fields.clone());
    HttpServer::new(move || {
        App::new()
            .wrap(cors(&cors_config))
            .wrap_fn({
                let mask_fields = mask_fields.clone();
                move |req, srv| request_log::log_request(req, srv, &mask_fields)
            })
            .app_data(state.clone())
            .configure(api::configure)
    })
    .listen(listener)?
    .workers(config.server.workers as usize)
    .run()
    .await
    .context("running HTTP server")?;

    Ok(())
}
