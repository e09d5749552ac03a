use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use bookshare_types::api::{AddBookRequest, AddBookResponse, BookPageResponse, Claims};
use bookshare_types::models::{Book, Listing};

use crate::state::{AppState, run_db};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Title matches win; author matches are only returned when no title matches.
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let keyword = query.q.trim().to_string();
    if keyword.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let rows = run_db(&state, move |db| db.search_books(&keyword)).await?;
    Ok(Json(rows.into_iter().map(Book::from).collect::<Vec<_>>()))
}

pub async fn list_books(State(state): State<AppState>) -> Result<impl IntoResponse, StatusCode> {
    let rows = run_db(&state, |db| db.list_books()).await?;
    Ok(Json(rows.into_iter().map(Book::from).collect::<Vec<_>>()))
}

/// Add a title to the catalog. An existing (title, author) pair is not an
/// error: its id comes back with `created: false`.
pub async fn add_book(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddBookRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let title = req.title.trim().to_string();
    let author = req.author.trim().to_string();
    if title.is_empty() || author.is_empty() || title.len() > 140 || author.len() > 140 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let (book_id, created) = run_db(&state, move |db| {
        db.ensure_book(&title, &author, req.isbn.as_deref(), Some(claims.sub))
    })
    .await?;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(AddBookResponse { book_id, created })))
}

pub async fn book_page(
    State(state): State<AppState>,
    Path(book_id): Path<i64>,
) -> Result<impl IntoResponse, StatusCode> {
    let (book, listings) = run_db(&state, move |db| {
        let book = db.get_book(book_id)?;
        let listings = db.list_listings_by_book(book_id)?;
        Ok((book, listings))
    })
    .await?;

    Ok(Json(BookPageResponse {
        book: book.into(),
        listings: listings.into_iter().map(Listing::from).collect(),
    }))
}

const MAX_MARKER_BOOKS: usize = 200;

#[derive(Debug, Deserialize)]
pub struct MarkersQuery {
    #[serde(default)]
    pub book_ids: String,
}

/// Markers for a set of books, e.g. the ids of a search result or of the
/// feed. `book_ids` is a comma-separated list; unknown ids contribute nothing.
pub async fn markers_for_books(
    State(state): State<AppState>,
    Query(query): Query<MarkersQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let mut ids = query
        .book_ids
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<i64>().map_err(|_| StatusCode::BAD_REQUEST))
        .collect::<Result<Vec<_>, _>>()?;
    ids.sort_unstable();
    ids.dedup();
    if ids.len() > MAX_MARKER_BOOKS {
        return Err(StatusCode::BAD_REQUEST);
    }

    let markers = run_db(&state, move |db| db.map_markers_for_books(&ids)).await?;
    Ok(Json(markers))
}

/// Where the active copies of a book are, for the map.
pub async fn markers(
    State(state): State<AppState>,
    Path(book_id): Path<i64>,
) -> Result<impl IntoResponse, StatusCode> {
    let markers = run_db(&state, move |db| {
        db.get_book(book_id)?;
        db.map_markers_for_books(&[book_id])
    })
    .await?;
    Ok(Json(markers))
}
