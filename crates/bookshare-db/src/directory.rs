use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use crate::error::on_constraint;
use crate::models::UserRow;
use crate::{Database, DbError, Result};

/// Stand-in for a user who has never opened their inbox.
pub fn never_read() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1900, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl Database {
    /// Register a user. Username and email must both be unused.
    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<i64> {
        self.with_conn(|conn| insert_user(conn, username, email, password_hash, latitude, longitude))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<UserRow> {
        self.with_conn(|conn| {
            query_user(conn, "username = ?1", username)?
                .ok_or_else(|| DbError::not_found("user", username))
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<UserRow> {
        self.with_conn(|conn| {
            query_user(conn, "id = ?1", id)?.ok_or_else(|| DbError::not_found("user", id))
        })
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM users ORDER BY id", UserRow::COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], UserRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Store the profile as given. Coordinates are not range-checked here.
    pub fn update_profile(
        &self,
        user_id: i64,
        about_me: &str,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<UserRow> {
        self.with_tx(|tx| {
            let changed = tx.execute(
                "UPDATE users SET about_me = ?2, latitude = ?3, longitude = ?4 WHERE id = ?1",
                params![user_id, about_me, latitude, longitude],
            )?;
            if changed == 0 {
                return Err(DbError::not_found("user", user_id));
            }
            query_user(tx, "id = ?1", user_id)?.ok_or_else(|| DbError::not_found("user", user_id))
        })
    }

    pub fn touch_last_seen(&self, user_id: i64) -> Result<()> {
        self.set_user_timestamp(user_id, "last_seen")
    }

    pub fn mark_messages_read(&self, user_id: i64) -> Result<()> {
        self.set_user_timestamp(user_id, "last_message_read_at")
    }

    fn set_user_timestamp(&self, user_id: i64, column: &'static str) -> Result<()> {
        self.with_conn(|conn| {
            let sql = format!("UPDATE users SET {} = ?2 WHERE id = ?1", column);
            let changed = conn.execute(&sql, params![user_id, Utc::now()])?;
            if changed == 0 {
                return Err(DbError::not_found("user", user_id));
            }
            Ok(())
        })
    }

    /// Messages addressed to the user since they last opened their inbox.
    pub fn new_message_count(&self, user_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            let last_read: Option<Option<DateTime<Utc>>> = conn
                .query_row(
                    "SELECT last_message_read_at FROM users WHERE id = ?1",
                    [user_id],
                    |row| row.get(0),
                )
                .optional()?;
            let since = last_read
                .ok_or_else(|| DbError::not_found("user", user_id))?
                .unwrap_or_else(never_read);

            let count = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE recipient_id = ?1 AND created_at > ?2",
                params![user_id, since],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}

pub(crate) fn insert_user(
    conn: &Connection,
    username: &str,
    email: &str,
    password_hash: &str,
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Result<i64> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO users (username, email, password, latitude, longitude, about_me, created_at, last_seen)
         VALUES (?1, ?2, ?3, ?4, ?5, '', ?6, ?6)",
        params![username, email, password_hash, latitude, longitude, now],
    )
    .map_err(|e| {
        on_constraint(e, || {
            DbError::Conflict(format!("username {} or email {} is taken", username, email))
        })
    })?;

    let id = conn.last_insert_rowid();
    info!("User registered: {} (id {})", username, id);
    Ok(id)
}

fn query_user<P: rusqlite::ToSql>(
    conn: &Connection,
    filter: &str,
    key: P,
) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE {}", UserRow::COLUMNS, filter);
    let row = conn.query_row(&sql, [key], UserRow::from_row).optional()?;
    Ok(row)
}
