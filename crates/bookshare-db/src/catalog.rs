use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::models::{BookRow, OwnedBookRow};
use crate::{Database, DbError, Result};

impl Database {
    /// Case-sensitive substring search on title, falling back to author only
    /// when no title matches. The two fields are never combined, so a keyword
    /// spanning both ("Hamlet William") finds nothing.
    pub fn search_books(&self, keyword: &str) -> Result<Vec<BookRow>> {
        self.with_conn(|conn| {
            let by_title = query_books(conn, "WHERE instr(title, ?1) > 0", keyword)?;
            if !by_title.is_empty() {
                return Ok(by_title);
            }
            query_books(conn, "WHERE instr(author, ?1) > 0", keyword)
        })
    }

    /// Insert a book unless the (title, author) pair is already catalogued,
    /// in which case `None` is returned. Check and insert are separate
    /// statements; concurrent writers in other processes can still race.
    pub fn create_book(&self, title: &str, author: &str) -> Result<Option<BookRow>> {
        self.with_conn(|conn| {
            if query_book_id(conn, title, author)?.is_some() {
                debug!("Book \"{}\" by {} already catalogued", title, author);
                return Ok(None);
            }
            insert_book(conn, title, author, (None, None), None).map(Some)
        })
    }

    /// Return the id of the (title, author) book, creating it first if needed.
    /// The bool is true when a new row was inserted.
    pub fn ensure_book(
        &self,
        title: &str,
        author: &str,
        isbn: Option<&str>,
        created_by: Option<i64>,
    ) -> Result<(i64, bool)> {
        self.with_conn(|conn| {
            if let Some(id) = query_book_id(conn, title, author)? {
                return Ok((id, false));
            }
            let isbn = isbn.map(parse_isbn).unwrap_or((None, None));
            let book = insert_book(conn, title, author, isbn, created_by)?;
            Ok((book.id, true))
        })
    }

    pub fn find_book_id(&self, title: &str, author: &str) -> Result<Option<i64>> {
        self.with_conn(|conn| query_book_id(conn, title, author))
    }

    pub fn get_book(&self, id: i64) -> Result<BookRow> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM books WHERE id = ?1", BookRow::COLUMNS);
            conn.query_row(&sql, [id], BookRow::from_row)
                .optional()?
                .ok_or_else(|| DbError::not_found("book", id))
        })
    }

    pub fn list_books(&self) -> Result<Vec<BookRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM books ORDER BY id", BookRow::COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], BookRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Titles a user has copies of, one entry per listed copy.
    pub fn books_owned_by(&self, user_id: i64) -> Result<Vec<OwnedBookRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.username, b.title, b.author
                 FROM book_instances bi
                 JOIN users u ON bi.owner_id = u.id
                 JOIN books b ON bi.book_id = b.id
                 WHERE bi.owner_id = ?1
                 ORDER BY bi.id DESC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(OwnedBookRow {
                        username: row.get(0)?,
                        title: row.get(1)?,
                        author: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

pub(crate) fn query_book_id(conn: &Connection, title: &str, author: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM books WHERE title = ?1 AND author = ?2 ORDER BY id LIMIT 1",
            [title, author],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

fn query_books(conn: &Connection, filter: &str, keyword: &str) -> Result<Vec<BookRow>> {
    let sql = format!(
        "SELECT {} FROM books {} ORDER BY id",
        BookRow::COLUMNS,
        filter
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([keyword], BookRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn insert_book(
    conn: &Connection,
    title: &str,
    author: &str,
    (isbn_10, isbn_13): (Option<i64>, Option<i64>),
    created_by: Option<i64>,
) -> Result<BookRow> {
    let created_at = Utc::now();
    conn.execute(
        "INSERT INTO books (title, author, isbn_10, isbn_13, created_by, created_at, instance_counter)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
        params![title, author, isbn_10, isbn_13, created_by, created_at],
    )
    .map_err(|e| {
        crate::error::on_constraint(e, || {
            DbError::IntegrityViolation(format!("book creator {:?} does not exist", created_by))
        })
    })?;

    let id = conn.last_insert_rowid();
    info!("Book created \"{}\" \"{}\" (id {})", title, author, id);

    Ok(BookRow {
        id,
        title: title.to_string(),
        author: author.to_string(),
        isbn_10,
        isbn_13,
        created_by,
        created_at,
        instance_counter: 0,
    })
}

/// Split a user-typed ISBN into the (isbn_10, isbn_13) columns. Hyphens and
/// spaces are ignored; anything that is not 10 or 13 digits is dropped.
///
/// Both columns are INTEGER, so an ISBN-10 loses its leading zeros
/// ("0-14-044926-9" is stored as 140449269) and one ending in an `X` check
/// digit cannot be stored at all. Format with `{:010}` when displaying.
pub(crate) fn parse_isbn(raw: &str) -> (Option<i64>, Option<i64>) {
    let digits: String = raw.chars().filter(|c| !matches!(c, '-' | ' ')).collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return (None, None);
    }
    let value = digits.parse::<i64>().ok();
    match digits.len() {
        10 => (value, None),
        13 => (None, value),
        _ => (None, None),
    }
}
