use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use parley_core::ChatError;
use parley_types::api::{Claims, RegisterRequest, UserResponse};

use crate::auth::{AppState, hash_password};
use crate::blocking;
use crate::error::ApiError;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 1024;

/// Lower-case and sanity-check an email address.
pub fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(ApiError::validation("invalid email address"));
    }
    Ok(email)
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email)?;
    if req.password.len() < MIN_PASSWORD_LEN || req.password.len() > MAX_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "password must be between {} and {} bytes",
            MIN_PASSWORD_LEN, MAX_PASSWORD_LEN
        )));
    }

    let db = state.db.clone();
    let user_id = Uuid::new_v4();
    let user = blocking(move || {
        if db.get_user_by_email(&email)?.is_some() {
            return Ok(Err(email));
        }
        let password_hash = hash_password(&req.password)?;
        // The unique index still guards against a concurrent registration.
        Ok(db.create_user(user_id, &email, &password_hash)?.ok_or(email))
    })
    .await?
    .map_err(|email| {
        ApiError::Chat(ChatError::Conflict(format!("User with email {} already exists", email)))
    })?;

    info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Accounts other than the caller's own look absent.
fn require_self(user_id: Uuid, claims: &Claims) -> Result<(), ApiError> {
    if user_id != claims.sub {
        return Err(ApiError::not_found());
    }
    Ok(())
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_self(user_id, &claims)?;

    let db = state.db.clone();
    let user = blocking(move || db.get_user_by_id(user_id)?.map(|row| row.to_user()).transpose())
        .await?
        .ok_or_else(ApiError::not_found)?;

    Ok(Json(UserResponse::from(user)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_self(user_id, &claims)?;

    let db = state.db.clone();
    let deleted = blocking(move || db.delete_user(user_id)).await?;
    if !deleted {
        return Err(ApiError::not_found());
    }

    info!(user_id = %user_id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
