use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use bookshare_db::models::MessageDeletion;
use bookshare_types::api::{
    Claims, ListingMessageRequest, MessageDeleteOutcome, MessageDeleteResponse, SendMessageRequest,
    UnreadCountResponse,
};
use bookshare_types::models::Message;

use crate::state::{AppState, run_db};

const MAX_BODY_LEN: usize = 140;

/// The caller's conversations, newest first. Opening the inbox resets the
/// unread counter.
pub async fn inbox(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let rows = run_db(&state, move |db| {
        db.mark_messages_read(claims.sub)?;
        db.list_messages_for_user(claims.sub)
    })
    .await?;
    Ok(Json(rows.into_iter().map(Message::from).collect::<Vec<_>>()))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let count = run_db(&state, move |db| db.new_message_count(claims.sub)).await?;
    Ok(Json(UnreadCountResponse { count }))
}

/// Write to a user by name, optionally continuing an earlier message's thread.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    validate_body(&req.body)?;

    let row = run_db(&state, move |db| {
        db.reply_to_message(req.prev_message_id, claims.sub, &req.recipient, &req.body)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(Message::from(row))))
}

/// Ask the owner of a listing about it.
pub async fn message_owner(
    State(state): State<AppState>,
    Path(instance_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ListingMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    validate_body(&req.body)?;

    let row = run_db(&state, move |db| {
        let listing = db.get_listing(instance_id)?;
        db.send_message(claims.sub, listing.owner_id, listing.book_id, listing.id, &req.body)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(Message::from(row))))
}

/// Only the parties that can still see a message may read it.
pub async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let row = run_db(&state, move |db| db.get_message(id)).await?;

    let visible = (row.sender_id == claims.sub && row.exists_for_sender)
        || (row.recipient_id == claims.sub && row.exists_for_recipient);
    if !visible {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(Message::from(row)))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let deletion = run_db(&state, move |db| db.delete_message(id, claims.sub)).await?;

    let outcome = match deletion {
        MessageDeletion::Hidden => MessageDeleteOutcome::Hidden,
        MessageDeletion::Removed => MessageDeleteOutcome::Removed,
    };
    Ok(Json(MessageDeleteResponse { outcome }))
}

fn validate_body(body: &str) -> Result<(), StatusCode> {
    if body.trim().is_empty() || body.chars().count() > MAX_BODY_LEN {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(())
}
