//! Maps the domain error taxonomy onto HTTP responses.

use axum::Json;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

use parley_core::ChatError;

#[derive(Debug)]
pub enum ApiError {
    Chat(ChatError),
    /// Unknown email or wrong password at login.
    InvalidCredentials,
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn unauthenticated() -> Self {
        ApiError::Chat(ChatError::Unauthenticated)
    }

    pub fn not_found() -> Self {
        ApiError::Chat(ChatError::NotFound)
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Chat(ChatError::Validation(msg.into()))
    }

    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Chat(ChatError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            ApiError::Chat(ChatError::NotFound) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "Resource does not exist or does not belong to the current user".to_string(),
            ),
            ApiError::Chat(ChatError::Conflict(msg)) => {
                (StatusCode::CONFLICT, "CONFLICT", msg.clone())
            }
            ApiError::Chat(ChatError::Unauthenticated) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", "Not authenticated".to_string())
            }
            ApiError::Chat(ChatError::ModelUnavailable(_)) => (
                StatusCode::BAD_GATEWAY,
                "MODEL_UNAVAILABLE",
                "The language model is unavailable; your message was saved".to_string(),
            ),
            ApiError::Chat(ChatError::Storage(_)) | ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
            ApiError::InvalidCredentials => {
                (StatusCode::FORBIDDEN, "INVALID_CREDENTIALS", "Invalid credentials".to_string())
            }
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        ApiError::Chat(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Chat(ChatError::Storage(e)) | ApiError::Internal(e) => {
                error!("request failed: {:#}", e);
            }
            ApiError::Chat(ChatError::ModelUnavailable(e)) => {
                warn!("model unavailable: {}", e);
            }
            _ => {}
        }

        let (status, code, message) = self.parts();
        let body = Json(json!({ "error": code, "message": message }));

        if status == StatusCode::UNAUTHORIZED {
            return (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response();
        }
        (status, body).into_response()
    }
}
