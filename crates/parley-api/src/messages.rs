use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use parley_types::api::{Claims, MessageResponse, SendMessageRequest};
use parley_types::models::ChatKey;

use crate::auth::AppState;
use crate::error::ApiError;

/// Full transcript of an owned chat, oldest first.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = state
        .chats
        .messages(ChatKey::new(claims.sub, chat_id))
        .await?;
    Ok(Json(
        messages
            .into_iter()
            .map(MessageResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// Append a user message without requesting a reply.
pub async fn send_message(
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state
        .chats
        .append_user_message(ChatKey::new(claims.sub, chat_id), req.content)
        .await?;
    Ok((StatusCode::CREATED, Json(MessageResponse::from(message))))
}
