use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::error;

use crate::AppState;

pub async fn livez() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

/// Ready only when both Postgres and the session store answer.
pub async fn readyz(state: web::Data<AppState>) -> HttpResponse {
    let (database, store) = futures::join!(state.users.ping(), state.store.ping());

    if let Err(e) = &database {
        error!("[readiness probe] database ping error: {}", e);
    }
    if let Err(e) = &store {
        error!("[readiness probe] store ping error: {}", e);
    }

    let body = json!({
        "database": database.is_ok(),
        "store": store.is_ok(),
    });
    if database.is_ok() && store.is_ok() {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}
