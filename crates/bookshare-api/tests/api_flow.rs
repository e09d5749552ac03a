//! Drives the router end to end against an in-memory store.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use bookshare_api::router::router;
use bookshare_api::state::AppStateInner;
use bookshare_db::Database;

const SECRET: &str = "integration-test-secret";

fn app() -> Router {
    let db = Database::open_in_memory().unwrap();
    router(Arc::new(AppStateInner {
        db,
        jwt_secret: SECRET.to_string(),
    }))
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn register(app: &Router, username: &str) -> (i64, String) {
    let (status, body) = call(
        app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@gmail.com"),
            "password": "long enough password",
            "latitude": 50.45,
            "longitude": 30.52,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    (
        body["user_id"].as_i64().unwrap(),
        body["token"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn protected_routes_need_a_token() {
    let app = app();
    let (status, _) = call(&app, Method::GET, "/books", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, Method::GET, "/books", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, Method::GET, "/feed", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn listing_and_messaging_flow() {
    let app = app();
    let (owner_id, owner) = register(&app, "ccc").await;
    let (_, buyer) = register(&app, "ddd").await;
    let (_, outsider) = register(&app, "eee").await;

    // catalog entry, then a duplicate add that resolves to the same book
    let (status, body) = call(
        &app,
        Method::POST,
        "/books",
        Some(&owner),
        Some(json!({ "title": "Hamlet", "author": "William Shakespeare" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let book_id = body["book_id"].as_i64().unwrap();

    let (status, body) = call(
        &app,
        Method::POST,
        "/books",
        Some(&buyer),
        Some(json!({ "title": "Hamlet", "author": "William Shakespeare" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["book_id"].as_i64(), Some(book_id));
    assert_eq!(body["created"], json!(false));

    let (status, listing) = call(
        &app,
        Method::POST,
        &format!("/books/{book_id}/instances"),
        Some(&owner),
        Some(json!({ "price": 50, "condition": 5, "description": "first folio" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let instance_id = listing["id"].as_i64().unwrap();
    assert_eq!(listing["owner_id"].as_i64(), Some(owner_id));

    let (_, page) = call(&app, Method::GET, &format!("/books/{book_id}"), Some(&buyer), None).await;
    assert_eq!(page["book"]["instance_counter"], json!(1));

    let (_, feed) = call(&app, Method::GET, "/feed", None, None).await;
    assert_eq!(feed.as_array().unwrap().len(), 1);

    let (_, found) = call(&app, Method::GET, "/search?q=Shakespeare", Some(&buyer), None).await;
    assert_eq!(found[0]["title"], json!("Hamlet"));

    // only the owner may touch the listing
    let (status, _) = call(
        &app,
        Method::DELETE,
        &format!("/instances/{instance_id}"),
        Some(&buyer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // buyer asks about it
    let (status, msg) = call(
        &app,
        Method::POST,
        &format!("/instances/{instance_id}/messages"),
        Some(&buyer),
        Some(json!({ "body": "Is it still available?" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let message_id = msg["id"].as_i64().unwrap();
    assert_eq!(msg["book_instance_id"].as_i64(), Some(instance_id));

    let (_, unread) = call(&app, Method::GET, "/messages/unread", Some(&owner), None).await;
    assert_eq!(unread["count"], json!(1));
    let (_, inbox) = call(&app, Method::GET, "/messages", Some(&owner), None).await;
    assert_eq!(inbox.as_array().unwrap().len(), 1);
    let (_, unread) = call(&app, Method::GET, "/messages/unread", Some(&owner), None).await;
    assert_eq!(unread["count"], json!(0));

    // an outsider can neither read nor delete it
    let (status, _) = call(
        &app,
        Method::GET,
        &format!("/messages/{message_id}"),
        Some(&outsider),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(
        &app,
        Method::DELETE,
        &format!("/messages/{message_id}"),
        Some(&outsider),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, deleted) = call(
        &app,
        Method::DELETE,
        &format!("/messages/{message_id}"),
        Some(&buyer),
        None,
    )
    .await;
    assert_eq!(deleted["outcome"], json!("hidden"));
    let (_, deleted) = call(
        &app,
        Method::DELETE,
        &format!("/messages/{message_id}"),
        Some(&owner),
        None,
    )
    .await;
    assert_eq!(deleted["outcome"], json!("removed"));

    // owner retires the listing
    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/instances/{instance_id}/deactivate"),
        Some(&owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, feed) = call(&app, Method::GET, "/feed", None, None).await;
    assert!(feed.as_array().unwrap().is_empty());

    let (status, _) = call(
        &app,
        Method::DELETE,
        &format!("/instances/{instance_id}"),
        Some(&owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, page) = call(&app, Method::GET, &format!("/books/{book_id}"), Some(&owner), None).await;
    assert_eq!(page["book"]["instance_counter"], json!(0));

    let (status, _) = call(
        &app,
        Method::GET,
        &format!("/instances/{instance_id}"),
        Some(&owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn login_and_duplicate_registration() {
    let app = app();
    register(&app, "ccc").await;

    let (status, _) = call(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "username": "ccc",
            "email": "another@gmail.com",
            "password": "long enough password",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "username": "ccc", "password": "long enough password" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], json!("ccc"));

    let (status, _) = call(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "username": "ccc", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tokens_stop_working_after_clear() {
    let app = app();
    let (_, token) = register(&app, "ccc").await;

    let (status, _) = call(&app, Method::POST, "/admin/clear", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(&app, Method::GET, "/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

async fn list_copy(app: &Router, token: &str, title: &str, author: &str) -> i64 {
    let (_, body) = call(
        app,
        Method::POST,
        "/books",
        Some(token),
        Some(json!({ "title": title, "author": author })),
    )
    .await;
    let book_id = body["book_id"].as_i64().unwrap();
    let (status, _) = call(
        app,
        Method::POST,
        &format!("/books/{book_id}/instances"),
        Some(token),
        Some(json!({ "price": 40, "condition": 4, "description": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    book_id
}

#[tokio::test]
async fn markers_cover_every_requested_book() {
    let app = app();
    let (_, ccc) = register(&app, "ccc").await;
    let (_, ddd) = register(&app, "ddd").await;
    let hamlet = list_copy(&app, &ccc, "Hamlet", "William Shakespeare").await;
    let ulysses = list_copy(&app, &ddd, "Ulysses", "James Joyce").await;

    let (status, found) = call(&app, Method::GET, "/search?q=William", Some(&ccc), None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<String> = found
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["id"].as_i64().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec![hamlet.to_string()]);

    let (status, markers) = call(
        &app,
        Method::GET,
        &format!("/markers?book_ids={}", ids.join(",")),
        Some(&ccc),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(markers.as_array().unwrap().len(), 1);
    assert_eq!(markers[0]["label"], json!("ccc"));

    let uri = format!("/markers?book_ids={hamlet},{ulysses},{hamlet}");
    let (_, markers) = call(&app, Method::GET, &uri, Some(&ccc), None).await;
    let labels: Vec<&str> = markers
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, vec!["ccc", "ddd"]);

    let (status, markers) = call(&app, Method::GET, "/markers", Some(&ccc), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(markers, json!([]));

    let (status, _) = call(&app, Method::GET, "/markers?book_ids=1,two", Some(&ccc), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
