use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;

use bookshare_types::api::SeedResponse;

use crate::auth::hash_password;
use crate::state::{AppState, run_db};

/// Load the demo roster, catalog and listings.
pub async fn seed(State(state): State<AppState>) -> Result<impl IntoResponse, StatusCode> {
    let summary = run_db(&state, |db| db.seed(&mut rand::rng(), hash_password)).await?;

    Ok(Json(SeedResponse {
        users: summary.users,
        books: summary.books,
        listings: summary.listings,
    }))
}

/// Empty every table.
pub async fn clear(State(state): State<AppState>) -> Result<impl IntoResponse, StatusCode> {
    run_db(&state, |db| db.clear()).await?;
    info!("Store cleared on request");
    Ok(StatusCode::NO_CONTENT)
}
