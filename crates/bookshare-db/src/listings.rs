use bookshare_types::models::MapMarker;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::error::on_constraint;
use crate::models::ListingRow;
use crate::{Database, DbError, Result};

impl Database {
    /// List a copy of a book. The row insert and the counter increment share
    /// one transaction.
    pub fn create_listing(
        &self,
        book_id: i64,
        owner_id: i64,
        price: i64,
        condition: i64,
        description: &str,
    ) -> Result<ListingRow> {
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO book_instances (book_id, owner_id, price, condition, description, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
                params![book_id, owner_id, price, condition, description, Utc::now()],
            )
            .map_err(|e| {
                on_constraint(e, || {
                    DbError::IntegrityViolation(format!(
                        "listing references missing book {} or owner {}",
                        book_id, owner_id
                    ))
                })
            })?;
            let id = tx.last_insert_rowid();

            let counter = increment_instance_counter(tx, book_id)?;
            debug!("Book {} now has {} instances", book_id, counter);

            query_listing(tx, id)?.ok_or_else(|| DbError::not_found("book instance", id))
        })
    }

    /// Remove a listing and decrement its book's counter. A counter that is
    /// already zero aborts the whole deletion and leaves the row in place.
    pub fn delete_listing(&self, id: i64) -> Result<()> {
        self.with_tx(|tx| {
            let book_id: i64 = tx
                .query_row("SELECT book_id FROM book_instances WHERE id = ?1", [id], |row| {
                    row.get(0)
                })
                .optional()?
                .ok_or_else(|| DbError::not_found("book instance", id))?;

            let remaining = decrement_instance_counter(tx, book_id)?;
            tx.execute("DELETE FROM book_instances WHERE id = ?1", [id])?;

            info!("Deleted book instance {} (book {} has {} left)", id, book_id, remaining);
            Ok(())
        })
    }

    pub fn activate_listing(&self, id: i64) -> Result<()> {
        self.set_listing_active(id, true)
    }

    pub fn deactivate_listing(&self, id: i64) -> Result<()> {
        self.set_listing_active(id, false)
    }

    /// Idempotent: setting the current value again is not an error.
    pub fn set_listing_active(&self, id: i64, active: bool) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE book_instances SET is_active = ?2 WHERE id = ?1",
                params![id, active],
            )?;
            if changed == 0 {
                return Err(DbError::not_found("book instance", id));
            }
            Ok(())
        })
    }

    pub fn update_listing(
        &self,
        id: i64,
        price: i64,
        condition: i64,
        description: &str,
    ) -> Result<ListingRow> {
        self.with_tx(|tx| {
            let changed = tx.execute(
                "UPDATE book_instances SET price = ?2, condition = ?3, description = ?4 WHERE id = ?1",
                params![id, price, condition, description],
            )?;
            if changed == 0 {
                return Err(DbError::not_found("book instance", id));
            }
            query_listing(tx, id)?.ok_or_else(|| DbError::not_found("book instance", id))
        })
    }

    /// `NotFound` if the listing is gone, `PermissionDenied` if `user_id`
    /// does not own it.
    pub fn ensure_listing_owner(&self, id: i64, user_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            let owner: i64 = conn
                .query_row("SELECT owner_id FROM book_instances WHERE id = ?1", [id], |row| {
                    row.get(0)
                })
                .optional()?
                .ok_or_else(|| DbError::not_found("book instance", id))?;
            if owner != user_id {
                return Err(DbError::PermissionDenied(format!(
                    "user {} does not own book instance {}",
                    user_id, id
                )));
            }
            Ok(())
        })
    }

    pub fn get_listing(&self, id: i64) -> Result<ListingRow> {
        self.with_conn(|conn| {
            query_listing(conn, id)?.ok_or_else(|| DbError::not_found("book instance", id))
        })
    }

    /// Newest first.
    pub fn list_listings_by_owner(&self, owner_id: i64) -> Result<Vec<ListingRow>> {
        self.with_conn(|conn| {
            query_listings(conn, "WHERE bi.owner_id = ?1 ORDER BY bi.id DESC", [owner_id])
        })
    }

    /// Newest first.
    pub fn list_listings_by_book(&self, book_id: i64) -> Result<Vec<ListingRow>> {
        self.with_conn(|conn| {
            query_listings(conn, "WHERE bi.book_id = ?1 ORDER BY bi.id DESC", [book_id])
        })
    }

    /// Home page feed: the `limit` most recently listed active copies.
    pub fn list_freshest_listings(&self, limit: u32) -> Result<Vec<ListingRow>> {
        self.with_conn(|conn| {
            query_listings(
                conn,
                "WHERE bi.is_active = 1 ORDER BY bi.created_at DESC, bi.id DESC LIMIT ?1",
                [limit],
            )
        })
    }

    pub fn list_all_listings(&self) -> Result<Vec<ListingRow>> {
        self.with_conn(|conn| query_listings(conn, "", []))
    }

    /// Owner locations of the active copies of the given books. Owners who
    /// never set a location are skipped.
    pub fn map_markers_for_books(&self, book_ids: &[i64]) -> Result<Vec<MapMarker>> {
        if book_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=book_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT DISTINCT u.username, u.latitude, u.longitude
                 FROM book_instances bi
                 JOIN users u ON bi.owner_id = u.id
                 WHERE bi.is_active = 1
                   AND u.latitude IS NOT NULL
                   AND u.longitude IS NOT NULL
                   AND bi.book_id IN ({})
                 ORDER BY u.username",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(book_ids), |row| {
                    Ok(MapMarker {
                        label: row.get(0)?,
                        latitude: row.get(1)?,
                        longitude: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

/// Atomically bump a book's counter, returning the new value.
pub(crate) fn increment_instance_counter(conn: &Connection, book_id: i64) -> Result<i64> {
    conn.query_row(
        "UPDATE books SET instance_counter = instance_counter + 1 WHERE id = ?1
         RETURNING instance_counter",
        [book_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| DbError::IntegrityViolation(format!("book {} does not exist", book_id)))
}

/// Atomically lower a book's counter, returning the new value. Never goes
/// below zero.
pub(crate) fn decrement_instance_counter(conn: &Connection, book_id: i64) -> Result<i64> {
    conn.query_row(
        "UPDATE books SET instance_counter = instance_counter - 1
         WHERE id = ?1 AND instance_counter > 0
         RETURNING instance_counter",
        [book_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| {
        DbError::IntegrityViolation(format!(
            "instance_counter for book {} is already 0 or the book is missing",
            book_id
        ))
    })
}

fn query_listing(conn: &Connection, id: i64) -> Result<Option<ListingRow>> {
    let sql = format!("{} WHERE bi.id = ?1", ListingRow::SELECT);
    let row = conn.query_row(&sql, [id], ListingRow::from_row).optional()?;
    Ok(row)
}

fn query_listings<P: rusqlite::Params>(
    conn: &Connection,
    tail: &str,
    params: P,
) -> Result<Vec<ListingRow>> {
    let sql = format!("{} {}", ListingRow::SELECT, tail);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params, ListingRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
