use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use bookshare_types::api::{Claims, ListingRequest};
use bookshare_types::models::Listing;

use crate::state::{AppState, run_db};

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    30
}

/// Home page feed of the freshest active listings, with owner locations.
pub async fn feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let limit = query.limit.min(200);
    let rows = run_db(&state, move |db| db.list_freshest_listings(limit)).await?;
    Ok(Json(rows.into_iter().map(Listing::from).collect::<Vec<_>>()))
}

pub async fn list_all(State(state): State<AppState>) -> Result<impl IntoResponse, StatusCode> {
    let rows = run_db(&state, |db| db.list_all_listings()).await?;
    Ok(Json(rows.into_iter().map(Listing::from).collect::<Vec<_>>()))
}

pub async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, StatusCode> {
    let row = run_db(&state, move |db| db.get_listing(id)).await?;
    Ok(Json(Listing::from(row)))
}

pub async fn create_listing(
    State(state): State<AppState>,
    Path(book_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ListingRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    validate(&req)?;

    let row = run_db(&state, move |db| {
        // unknown book is the caller's mistake, not a broken invariant
        db.get_book(book_id)?;
        db.create_listing(book_id, claims.sub, req.price, req.condition, &req.description)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(Listing::from(row))))
}

pub async fn update_listing(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ListingRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    validate(&req)?;

    let row = run_db(&state, move |db| {
        db.ensure_listing_owner(id, claims.sub)?;
        db.update_listing(id, req.price, req.condition, &req.description)
    })
    .await?;

    Ok(Json(Listing::from(row)))
}

pub async fn delete_listing(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    run_db(&state, move |db| {
        db.ensure_listing_owner(id, claims.sub)?;
        db.delete_listing(id)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn activate(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    set_active(state, id, claims.sub, true).await
}

pub async fn deactivate(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    set_active(state, id, claims.sub, false).await
}

async fn set_active(
    state: AppState,
    id: i64,
    user_id: i64,
    active: bool,
) -> Result<StatusCode, StatusCode> {
    run_db(&state, move |db| {
        db.ensure_listing_owner(id, user_id)?;
        db.set_listing_active(id, active)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn validate(req: &ListingRequest) -> Result<(), StatusCode> {
    if req.price < 0 || req.condition < 1 || req.description.len() > 2000 {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(())
}
