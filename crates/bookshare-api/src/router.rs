use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{admin, auth, books, listings, messages, users};

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/feed", get(listings::feed))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/search", get(books::search))
        .route("/books", get(books::list_books).post(books::add_book))
        .route("/books/{book_id}", get(books::book_page))
        .route("/books/{book_id}/markers", get(books::markers))
        .route("/markers", get(books::markers_for_books))
        .route("/books/{book_id}/instances", post(listings::create_listing))
        .route("/instances", get(listings::list_all))
        .route(
            "/instances/{id}",
            get(listings::get_listing)
                .put(listings::update_listing)
                .delete(listings::delete_listing),
        )
        .route("/instances/{id}/activate", post(listings::activate))
        .route("/instances/{id}/deactivate", post(listings::deactivate))
        .route("/instances/{id}/messages", post(messages::message_owner))
        .route("/users", get(users::list_users))
        .route("/users/{username}", get(users::profile))
        .route("/profile", put(users::update_profile))
        .route("/messages", get(messages::inbox).post(messages::send_message))
        .route("/messages/unread", get(messages::unread_count))
        .route(
            "/messages/{id}",
            get(messages::get_message).delete(messages::delete_message),
        )
        .route("/admin/seed", post(admin::seed))
        .route("/admin/clear", post(admin::clear))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
