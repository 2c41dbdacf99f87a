use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;

/// Envelope shared by every response of the profile API.
#[derive(Serialize, Debug)]
pub struct ResponseBody<T: Serialize> {
    pub message: String,
    pub status: Option<&'static str>,
    pub data: Option<T>,
}

impl<T: Serialize> ResponseBody<T> {
    pub fn with_data(message: &str, data: T) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
            status: None,
            data: Some(data),
        })
    }
}

impl ResponseBody<()> {
    pub fn message(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
            status: None,
            data: None,
        })
    }
}

#[derive(Debug)]
pub enum ServiceError {
    BadRequest(String),
    Conflict(String),
    NotFound(String),
    PayloadTooLarge(String),
    TooManyRequests(String),
    Unavailable(String),
    Internal(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ServiceError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ServiceError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ServiceError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            ServiceError::TooManyRequests(msg) => write!(f, "Too many requests: {}", msg),
            ServiceError::Unavailable(msg) => write!(f, "Unavailable: {}", msg),
            ServiceError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::http::Response<axum::body::Body> {
        let (status, code, message) = match self {
            ServiceError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            ServiceError::Conflict(msg) => (StatusCode::CONFLICT, "existing_user_name", msg),
            ServiceError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ServiceError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", msg)
            }
            ServiceError::TooManyRequests(msg) => {
                (StatusCode::TOO_MANY_REQUESTS, "rate_limited", msg)
            }
            ServiceError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "upload_error", msg),
            ServiceError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", msg),
        };
        let body = ResponseBody::<()> {
            message,
            status: Some(code),
            data: None,
        };
        (status, Json(body)).into_response()
    }
}
