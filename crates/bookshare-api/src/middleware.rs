use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use bookshare_types::api::Claims;

use crate::state::{AppState, run_db};

/// Extract and validate the JWT from the Authorization header, then record
/// the user as seen. Tokens for users that no longer exist are rejected.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let user_id = token_data.claims.sub;
    run_db(&state, move |db| db.touch_last_seen(user_id))
        .await
        .map_err(|status| match status {
            StatusCode::NOT_FOUND => StatusCode::UNAUTHORIZED,
            other => other,
        })?;

    req.extensions_mut().insert(token_data.claims);
    Ok(next.run(req).await)
}
