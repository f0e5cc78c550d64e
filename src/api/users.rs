use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::extractors::Principal;
use super::pagination::{
    page_window_clamped, pages_available, wanted_right, Pagination, PaginationQuery, WINDOW_WIDTH,
};
use super::response::{self, ApiResponse};
use crate::auth::normalize_identity;
use crate::db::{UserChanges, UserSnapshot};
use crate::error::{AppError, DatabaseError};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    /// Version the client last saw; the update is refused if it moved on.
    pub version: i32,
}

impl UpdateUserRequest {
    fn changes(&self) -> UserChanges {
        UserChanges {
            name: self.name.as_ref().map(|n| n.trim().to_string()),
            email: self.email.as_deref().map(normalize_identity),
        }
    }
}

async fn live_user(state: &AppState, id: Uuid) -> Result<UserSnapshot, AppError> {
    match state.users.find_by_id(id).await? {
        Some(user) if !user.is_deleted() => Ok(user.snapshot()),
        _ => Err(DatabaseError::NotFound.into()),
    }
}

pub async fn list_users(
    _principal: Principal,
    query: web::Query<PaginationQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let page = query.page();
    let page_size = query.page_size();
    let offset = query.offset();

    // One extra row tells whether a next page exists.
    let mut users = state.users.list_users(offset, page_size + 1).await?;
    let has_next = users.len() as i64 > page_size;
    users.truncate(page_size as usize);
    let has_prev = page > 1;

    let wanted = wanted_right(WINDOW_WIDTH, has_prev);
    let rows_after = if has_next {
        state
            .users
            .count_window(offset + page_size, wanted * page_size)
            .await?
    } else {
        0
    };
    let next_pages = pages_available(rows_after, page_size, wanted);

    let data: Vec<UserSnapshot> = users.iter().map(|u| u.snapshot()).collect();
    let pagination = Pagination {
        page,
        page_size,
        has_next,
        has_prev,
        total_elements: data.len() as i64,
        windows: page_window_clamped(page, WINDOW_WIDTH, has_prev, has_next, next_pages),
    };

    Ok(ApiResponse::new(actix_web::http::StatusCode::OK, data)
        .with_pagination(pagination)
        .into_response())
}

pub async fn get_user(
    _principal: Principal,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = live_user(&state, path.into_inner()).await?;
    Ok(response::ok(user))
}

pub async fn create_user(
    _principal: Principal,
    req: web::Json<CreateUserRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    req.validate()?;

    let user = state.auth.register(&req.name, &req.email, &req.password).await?;
    Ok(response::created(user.snapshot()))
}

pub async fn update_user(
    _principal: Principal,
    path: web::Path<Uuid>,
    req: web::Json<UpdateUserRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    req.validate()?;
    let changes = req.changes();
    if changes.is_empty() {
        return Err(AppError::ValidationError(
            "at least one of name or email is required".into(),
        ));
    }

    let user = state
        .users
        .update_user(path.into_inner(), req.version, &changes)
        .await?;
    Ok(response::ok(user.snapshot()))
}

/// Soft delete. The user's sessions end with it.
pub async fn delete_user(
    _principal: Principal,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = live_user(&state, path.into_inner()).await?;
    state.auth.deactivate(user.id, user.version).await?;
    Ok(HttpResponse::NoContent().finish())
}
