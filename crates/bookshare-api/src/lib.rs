pub mod admin;
pub mod auth;
pub mod books;
pub mod error;
pub mod listings;
pub mod messages;
pub mod middleware;
pub mod router;
pub mod state;
pub mod users;
