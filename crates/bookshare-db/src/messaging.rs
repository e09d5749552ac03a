use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::error::on_constraint;
use crate::models::{MessageDeletion, MessageRow, MessageVisibility};
use crate::{Database, DbError, Result};

impl Database {
    /// Store a new message, visible to both parties. `book_id` and
    /// `book_instance_id` may be 0 for a message without listing context.
    pub fn send_message(
        &self,
        sender_id: i64,
        recipient_id: i64,
        book_id: i64,
        book_instance_id: i64,
        body: &str,
    ) -> Result<MessageRow> {
        self.with_conn(|conn| {
            insert_message(conn, sender_id, recipient_id, book_id, book_instance_id, body)
        })
    }

    /// Answer `prev_message_id`, carrying over its listing context. A
    /// `prev_message_id` of 0 starts a conversation with no context.
    pub fn reply_to_message(
        &self,
        prev_message_id: i64,
        sender_id: i64,
        recipient_username: &str,
        body: &str,
    ) -> Result<MessageRow> {
        self.with_tx(|tx| {
            let recipient_id: i64 = tx
                .query_row(
                    "SELECT id FROM users WHERE username = ?1",
                    [recipient_username],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| DbError::not_found("user", recipient_username))?;

            let (book_id, book_instance_id) = if prev_message_id == 0 {
                (0, 0)
            } else {
                let prev = query_message(tx, prev_message_id)?
                    .ok_or_else(|| DbError::not_found("message", prev_message_id))?;
                (prev.book_id, prev.book_instance_id)
            };

            insert_message(tx, sender_id, recipient_id, book_id, book_instance_id, body)
        })
    }

    pub fn get_message(&self, id: i64) -> Result<MessageRow> {
        self.with_conn(|conn| {
            query_message(conn, id)?.ok_or_else(|| DbError::not_found("message", id))
        })
    }

    /// Everything the user sent or received and has not deleted, newest first.
    pub fn list_messages_for_user(&self, user_id: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM messages
                 WHERE (sender_id = ?1 AND exists_for_sender = 1)
                    OR (recipient_id = ?1 AND exists_for_recipient = 1)
                 ORDER BY created_at DESC, id DESC",
                MessageRow::COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], MessageRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Delete a message from `acting_user_id`'s view. The row itself is
    /// removed once neither party can see it. Users who are neither sender nor
    /// recipient get `PermissionDenied` and nothing changes.
    pub fn delete_message(&self, id: i64, acting_user_id: i64) -> Result<MessageDeletion> {
        self.with_tx(|tx| {
            let message =
                query_message(tx, id)?.ok_or_else(|| DbError::not_found("message", id))?;

            let is_sender = message.sender_id == acting_user_id;
            let is_recipient = message.recipient_id == acting_user_id;
            if !is_sender && !is_recipient {
                return Err(DbError::PermissionDenied(format!(
                    "user {} is not a party to message {}",
                    acting_user_id, id
                )));
            }

            let mut next = message.visibility();
            if is_sender {
                next = next.hide_for_sender();
            }
            if is_recipient {
                next = next.hide_for_recipient();
            }

            if next == MessageVisibility::Deleted {
                tx.execute("DELETE FROM messages WHERE id = ?1", [id])?;
                info!("Message {} removed, deleted by both parties", id);
                return Ok(MessageDeletion::Removed);
            }

            let (for_sender, for_recipient) = next.flags();
            tx.execute(
                "UPDATE messages SET exists_for_sender = ?2, exists_for_recipient = ?3 WHERE id = ?1",
                params![id, for_sender, for_recipient],
            )?;
            debug!("Message {} hidden for user {} ({:?})", id, acting_user_id, next);
            Ok(MessageDeletion::Hidden)
        })
    }
}

fn insert_message(
    conn: &Connection,
    sender_id: i64,
    recipient_id: i64,
    book_id: i64,
    book_instance_id: i64,
    body: &str,
) -> Result<MessageRow> {
    let created_at = Utc::now();
    // book_id 0 is stored as NULL so the foreign key to books still holds
    let stored_book_id = (book_id != 0).then_some(book_id);
    conn.execute(
        "INSERT INTO messages (book_id, book_instance_id, sender_id, recipient_id,
                               exists_for_sender, exists_for_recipient, body, created_at)
         VALUES (?1, ?2, ?3, ?4, 1, 1, ?5, ?6)",
        params![stored_book_id, book_instance_id, sender_id, recipient_id, body, created_at],
    )
    .map_err(|e| {
        on_constraint(e, || {
            DbError::IntegrityViolation(format!(
                "message from {} to {} references a missing user or book {}",
                sender_id, recipient_id, book_id
            ))
        })
    })?;

    Ok(MessageRow {
        id: conn.last_insert_rowid(),
        book_id,
        book_instance_id,
        sender_id,
        recipient_id,
        exists_for_sender: true,
        exists_for_recipient: true,
        body: body.to_string(),
        created_at,
    })
}

fn query_message(conn: &Connection, id: i64) -> Result<Option<MessageRow>> {
    let sql = format!("SELECT {} FROM messages WHERE id = ?1", MessageRow::COLUMNS);
    let row = conn.query_row(&sql, [id], MessageRow::from_row).optional()?;
    Ok(row)
}
