use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Extract and validate the JWT from the Authorization header, then make sure
/// the user it names still exists.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).ok_or_else(ApiError::unauthenticated)?;

    let claims = state.auth.verify_token(token).map_err(|e| {
        debug!("rejected bearer token: {}", e);
        ApiError::unauthenticated()
    })?;

    let db = state.db.clone();
    let user_id = claims.sub;
    let exists = blocking(move || Ok(db.get_user_by_id(user_id)?.is_some())).await?;
    if !exists {
        debug!(user_id = %user_id, "token names a deleted user");
        return Err(ApiError::unauthenticated());
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
