use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use parley_types::api::{
    ChatRequest, ChatResponse, Claims, ClearResponse, MessageResponse, SendMessageRequest,
};
use parley_types::models::ChatKey;

use crate::auth::AppState;
use crate::error::ApiError;

pub async fn list_chats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let chats = state.chats.list(claims.sub).await?;
    Ok(Json(chats.into_iter().map(ChatResponse::from).collect::<Vec<_>>()))
}

pub async fn get_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let chat = state
        .chats
        .require_existing(ChatKey::new(claims.sub, chat_id))
        .await?;
    Ok(Json(ChatResponse::from(chat)))
}

pub async fn create_chat(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let chat = state.chats.create(claims.sub, req.title).await?;
    Ok((StatusCode::CREATED, Json(ChatResponse::from(chat))))
}

pub async fn update_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let chat = state
        .chats
        .rename(ChatKey::new(claims.sub, chat_id), req.title)
        .await?;
    Ok(Json(ChatResponse::from(chat)))
}

pub async fn delete_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    state.chats.delete(ChatKey::new(claims.sub, chat_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.chats.clear(ChatKey::new(claims.sub, chat_id)).await?;
    Ok(Json(ClearResponse { deleted }))
}

/// Run one turn: store the utterance, ask the model, store and return the
/// reply. The chat is created on first use.
pub async fn talk(
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let reply = state
        .turns
        .send(ChatKey::new(claims.sub, chat_id), req.content)
        .await?;
    Ok(Json(MessageResponse::from(reply)))
}
