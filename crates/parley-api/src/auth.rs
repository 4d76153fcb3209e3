use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Form, Json, extract::State, response::IntoResponse};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::info;
use uuid::Uuid;

use parley_core::{ChatService, TurnOrchestrator};
use parley_db::Database;
use parley_types::api::{Claims, LoginForm, TokenResponse};

use crate::blocking;
use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub auth: AuthConfig,
    pub chats: ChatService,
    pub turns: TurnOrchestrator,
}

/// Token signing settings, built once at startup.
///
/// No `Debug`: the secret must never reach a log line.
#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    pub token_ttl: chrono::Duration,
}

impl AuthConfig {
    pub fn create_token(&self, user_id: Uuid, email: &str) -> anyhow::Result<String> {
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            exp: (chrono::Utc::now() + self.token_ttl).timestamp() as usize,
        };

        let token = encode(
            &Header::new(self.algorithm),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;

        Ok(token)
    }

    pub fn verify_token(&self, token: &str) -> jsonwebtoken::errors::Result<Claims> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(self.algorithm),
        )?;
        Ok(data.claims)
    }
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Exchange email (sent as `username`) and password for a bearer token.
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<impl IntoResponse, ApiError> {
    let email = form.username.trim().to_lowercase();

    let db = state.db.clone();
    let password = form.password;
    let user = blocking(move || {
        let Some(user) = db.get_user_by_email(&email)? else {
            return Ok(None);
        };
        // Argon2 verification stays on the blocking pool with the lookup.
        Ok(verify_password(&password, &user.password).then_some(user))
    })
    .await?
    .ok_or(ApiError::InvalidCredentials)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id '{}': {}", user.id, e)))?;

    let token = state.auth.create_token(user_id, &user.email)?;
    info!(user_id = %user_id, "user logged in");

    Ok(Json(TokenResponse {
        token,
        token_type: "bearer".to_string(),
    }))
}
