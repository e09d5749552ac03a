use serde::{Deserialize, Serialize};

use crate::models::{Book, Listing, User};

// -- JWT Claims --

/// JWT claims issued at login and checked by the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: i64,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: i64,
    pub username: String,
    pub token: String,
}

// -- Profile --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub about_me: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserProfileResponse {
    pub user: User,
    pub listings: Vec<Listing>,
    pub total_listings: usize,
}

// -- Catalog --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddBookRequest {
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddBookResponse {
    pub book_id: i64,
    /// False when the title/author pair was already in the catalog.
    pub created: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookPageResponse {
    pub book: Book,
    pub listings: Vec<Listing>,
}

// -- Listings --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListingRequest {
    pub price: i64,
    pub condition: i64,
    #[serde(default)]
    pub description: String,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub recipient: String,
    /// Message being answered; 0 opens a conversation with no listing context.
    #[serde(default)]
    pub prev_message_id: i64,
    pub body: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListingMessageRequest {
    pub body: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageDeleteOutcome {
    /// Hidden for the caller, still visible to the other party.
    Hidden,
    /// Neither party can see it any more; the row was removed.
    Removed,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageDeleteResponse {
    pub outcome: MessageDeleteOutcome,
}

// -- Maintenance --

#[derive(Debug, Serialize, Deserialize)]
pub struct SeedResponse {
    pub users: usize,
    pub books: usize,
    pub listings: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_message_defaults_to_no_context() {
        let req: SendMessageRequest =
            serde_json::from_str(r#"{"recipient":"ccc","body":"still available?"}"#).unwrap();
        assert_eq!(req.prev_message_id, 0);
        assert_eq!(req.recipient, "ccc");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let res: Result<ListingRequest, _> =
            serde_json::from_str(r#"{"price":10,"condition":3,"owner_id":7}"#);
        assert!(res.is_err());
    }

    #[test]
    fn delete_outcome_is_snake_case() {
        let json = serde_json::to_string(&MessageDeleteResponse {
            outcome: MessageDeleteOutcome::Removed,
        })
        .unwrap();
        assert_eq!(json, r#"{"outcome":"removed"}"#);
    }
}
