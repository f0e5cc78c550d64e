use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use super::pagination::Pagination;

/// Success envelope shared by every JSON endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub timestamp: String,
    pub status_code: u16,
    pub code: &'static str,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

fn success_code(status: StatusCode) -> &'static str {
    match status.as_u16() {
        201 => "E20001",
        204 => "E20004",
        _ => "E20000",
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, data: T) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            status_code: status.as_u16(),
            code: success_code(status),
            data: Some(data),
            pagination: None,
        }
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn into_response(self) -> HttpResponse {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        HttpResponse::build(status).json(self)
    }
}

pub fn ok<T: Serialize>(data: T) -> HttpResponse {
    ApiResponse::new(StatusCode::OK, data).into_response()
}

pub fn created<T: Serialize>(data: T) -> HttpResponse {
    ApiResponse::new(StatusCode::CREATED, data).into_response()
}
