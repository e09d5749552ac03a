//! Database row types. These map directly to SQLite rows and are kept apart
//! from the bookshare-types API models so the store stays independent.

use bookshare_types::models::{Book, Listing, Message, User};
use chrono::{DateTime, Utc};
use rusqlite::Row;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub about_me: String,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub last_message_read_at: Option<DateTime<Utc>>,
}

impl UserRow {
    pub(crate) const COLUMNS: &'static str = "id, username, email, password, latitude, longitude, \
         about_me, created_at, last_seen, last_message_read_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password: row.get(3)?,
            latitude: row.get(4)?,
            longitude: row.get(5)?,
            about_me: row.get(6)?,
            created_at: row.get(7)?,
            last_seen: row.get(8)?,
            last_message_read_at: row.get(9)?,
        })
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            latitude: row.latitude,
            longitude: row.longitude,
            about_me: row.about_me,
            last_seen: row.last_seen,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BookRow {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub isbn_10: Option<i64>,
    pub isbn_13: Option<i64>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub instance_counter: i64,
}

impl BookRow {
    pub(crate) const COLUMNS: &'static str =
        "id, title, author, isbn_10, isbn_13, created_by, created_at, instance_counter";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            author: row.get(2)?,
            isbn_10: row.get(3)?,
            isbn_13: row.get(4)?,
            created_by: row.get(5)?,
            created_at: row.get(6)?,
            instance_counter: row.get(7)?,
        })
    }
}

impl From<BookRow> for Book {
    fn from(row: BookRow) -> Self {
        Book {
            id: row.id,
            title: row.title,
            author: row.author,
            isbn_10: row.isbn_10,
            isbn_13: row.isbn_13,
            instance_counter: row.instance_counter,
            created_at: row.created_at,
        }
    }
}

/// A book instance joined with its owner and its catalog entry.
#[derive(Debug, Clone)]
pub struct ListingRow {
    pub id: i64,
    pub book_id: i64,
    pub owner_id: i64,
    pub owner_username: String,
    pub owner_latitude: Option<f64>,
    pub owner_longitude: Option<f64>,
    pub title: String,
    pub author: String,
    pub price: i64,
    pub condition: i64,
    pub description: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl ListingRow {
    pub(crate) const SELECT: &'static str = "SELECT bi.id, bi.book_id, bi.owner_id, u.username, u.latitude, u.longitude,
                b.title, b.author, bi.price, bi.condition, bi.description, bi.is_active, bi.created_at
         FROM book_instances bi
         JOIN users u ON bi.owner_id = u.id
         JOIN books b ON bi.book_id = b.id";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            book_id: row.get(1)?,
            owner_id: row.get(2)?,
            owner_username: row.get(3)?,
            owner_latitude: row.get(4)?,
            owner_longitude: row.get(5)?,
            title: row.get(6)?,
            author: row.get(7)?,
            price: row.get(8)?,
            condition: row.get(9)?,
            description: row.get(10)?,
            is_active: row.get(11)?,
            created_at: row.get(12)?,
        })
    }
}

impl From<ListingRow> for Listing {
    fn from(row: ListingRow) -> Self {
        Listing {
            id: row.id,
            book_id: row.book_id,
            owner_id: row.owner_id,
            owner_username: row.owner_username,
            owner_latitude: row.owner_latitude,
            owner_longitude: row.owner_longitude,
            title: row.title,
            author: row.author,
            price: row.price,
            condition: row.condition,
            description: row.description,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

/// `(username, title, author)` for every copy a user has listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedBookRow {
    pub username: String,
    pub title: String,
    pub author: String,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    /// 0 when the message has no listing context.
    pub book_id: i64,
    pub book_instance_id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub exists_for_sender: bool,
    pub exists_for_recipient: bool,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl MessageRow {
    pub(crate) const COLUMNS: &'static str = "id, COALESCE(book_id, 0), book_instance_id, sender_id, \
         recipient_id, exists_for_sender, exists_for_recipient, body, created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            book_id: row.get(1)?,
            book_instance_id: row.get(2)?,
            sender_id: row.get(3)?,
            recipient_id: row.get(4)?,
            exists_for_sender: row.get(5)?,
            exists_for_recipient: row.get(6)?,
            body: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    pub fn visibility(&self) -> MessageVisibility {
        MessageVisibility::from_flags(self.exists_for_sender, self.exists_for_recipient)
    }
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            id: row.id,
            book_id: row.book_id,
            book_instance_id: row.book_instance_id,
            sender_id: row.sender_id,
            recipient_id: row.recipient_id,
            body: row.body,
            created_at: row.created_at,
        }
    }
}

/// Per-party visibility of a message. `Deleted` is terminal: a message in that
/// state is removed from the store instead of being written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageVisibility {
    VisibleToBoth,
    SenderOnly,
    RecipientOnly,
    Deleted,
}

impl MessageVisibility {
    pub fn from_flags(for_sender: bool, for_recipient: bool) -> Self {
        match (for_sender, for_recipient) {
            (true, true) => Self::VisibleToBoth,
            (true, false) => Self::SenderOnly,
            (false, true) => Self::RecipientOnly,
            (false, false) => Self::Deleted,
        }
    }

    /// `(exists_for_sender, exists_for_recipient)`
    pub fn flags(self) -> (bool, bool) {
        match self {
            Self::VisibleToBoth => (true, true),
            Self::SenderOnly => (true, false),
            Self::RecipientOnly => (false, true),
            Self::Deleted => (false, false),
        }
    }

    pub fn hide_for_sender(self) -> Self {
        let (_, r) = self.flags();
        Self::from_flags(false, r)
    }

    pub fn hide_for_recipient(self) -> Self {
        let (s, _) = self.flags();
        Self::from_flags(s, false)
    }
}

/// What happened to a message after one party deleted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDeletion {
    /// Hidden for the acting user; the other party still sees it.
    Hidden,
    /// Both parties have deleted it and the row is gone.
    Removed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: usize,
    pub books: usize,
    pub listings: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub deactivated: usize,
    pub failed: usize,
}
