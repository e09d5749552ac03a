use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use bookshare_types::api::{Claims, UpdateProfileRequest, UserProfileResponse};
use bookshare_types::models::{Listing, User};

use crate::state::{AppState, run_db};

pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, StatusCode> {
    let rows = run_db(&state, |db| db.list_users()).await?;
    Ok(Json(rows.into_iter().map(User::from).collect::<Vec<_>>()))
}

pub async fn profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let (user, listings) = run_db(&state, move |db| {
        let user = db.get_user_by_username(&username)?;
        let listings = db.list_listings_by_owner(user.id)?;
        Ok((user, listings))
    })
    .await?;

    let listings: Vec<Listing> = listings.into_iter().map(Listing::from).collect();
    Ok(Json(UserProfileResponse {
        user: user.into(),
        total_listings: listings.len(),
        listings,
    }))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.about_me.len() > 140 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let row = run_db(&state, move |db| {
        db.update_profile(claims.sub, &req.about_me, req.latitude, req.longitude)
    })
    .await?;
    Ok(Json(User::from(row)))
}
