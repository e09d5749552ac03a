use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub about_me: String,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub isbn_10: Option<i64>,
    pub isbn_13: Option<i64>,
    pub instance_counter: i64,
    pub created_at: DateTime<Utc>,
}

/// A listed copy of a book, joined with its owner and catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
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

/// Direct message between two users. `book_id` and `book_instance_id` are 0
/// when the message is not about a particular listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub book_id: i64,
    pub book_instance_id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Point handed to the map renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapMarker {
    pub latitude: f64,
    pub longitude: f64,
    pub label: String,
}
