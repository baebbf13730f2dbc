//! API tests driving the router against the in-memory store

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{Days, NaiveDate};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

use library_server::{
    api,
    config::AppConfig,
    repository::Repository,
    services::{
        notifications::{LoanNotifier, NotificationDispatcher},
        Services,
    },
    AppResult, AppState,
};

fn app_with(dispatcher: NotificationDispatcher) -> Router {
    let config = AppConfig::default();
    let services = Services::with_dispatcher(Repository::in_memory(), &config, dispatcher);
    api::create_router(AppState::new(config, services))
}

fn app() -> Router {
    app_with(NotificationDispatcher::disabled())
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);
    send_raw(app, method, uri, body).await
}

async fn send_raw(app: &Router, method: Method, uri: &str, body: Body) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(format!("/api/v1{}", uri))
        .header("content-type", "application/json")
        .body(body)
        .expect("Failed to build request");

    let response = app.clone().oneshot(request).await.expect("Failed to send request");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Failed to parse response")
    };
    (status, body)
}

/// Creates an author and a book with `copies` copies; returns the book id
async fn seed_book(app: &Router, copies: i32) -> i64 {
    let (status, author) = send(
        app,
        Method::POST,
        "/authors",
        Some(json!({ "first_name": "Jorge Luis", "last_name": "Borges" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, book) = send(
        app,
        Method::POST,
        "/books",
        Some(json!({
            "title": "Ficciones",
            "author_id": author["id"],
            "total_copies": copies
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    book["id"].as_i64().expect("No book ID")
}

async fn seed_member(app: &Router, email: &str) -> i64 {
    let (status, member) = send(
        app,
        Method::POST,
        "/members",
        Some(json!({ "first_name": "Test", "last_name": "Reader", "email": email })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    member["id"].as_i64().expect("No member ID")
}

async fn available_copies(app: &Router, book_id: i64) -> i64 {
    let (_, book) = send(app, Method::GET, &format!("/books/{}", book_id), None).await;
    book["available_copies"].as_i64().expect("No available_copies")
}

fn date(value: &Value) -> NaiveDate {
    serde_json::from_value(value.clone()).expect("Not a date")
}

#[tokio::test]
async fn test_health_check() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_last_copy_scenario() {
    let app = app();
    let book = seed_book(&app, 1).await;
    let first = seed_member(&app, "first@example.org").await;
    let second = seed_member(&app, "second@example.org").await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/books/{}/loan", book),
        Some(json!({ "member_id": first })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "Book loaned successfully.");
    assert_eq!(body["data"]["is_returned"], false);
    assert_eq!(available_copies(&app, book).await, 0);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/books/{}/loan", book),
        Some(json!({ "member_id": second })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No available copies.");
    assert_eq!(available_copies(&app, book).await, 0);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/books/{}/return_book", book),
        Some(json!({ "member_id": first })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Book returned successfully.");
    assert_eq!(body["data"]["is_returned"], true);
    assert!(body["data"]["return_date"].is_string());
    assert_eq!(available_copies(&app, book).await, 1);
}

#[tokio::test]
async fn test_loan_errors_answer_bad_request() {
    let app = app();
    let book = seed_book(&app, 2).await;
    let member = seed_member(&app, "m@example.org").await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/books/{}/loan", book),
        Some(json!({ "member_id": 9999 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Member does not exist.");

    let (status, body) = send(&app, Method::POST, &format!("/books/{}/loan", book), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["member_id"].is_array());

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/books/{}/return_book", book),
        Some(json!({ "member_id": member })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Active loan does not exist.");

    assert_eq!(available_copies(&app, book).await, 2);
}

#[tokio::test]
async fn test_extend_due_date() {
    let app = app();
    let book = seed_book(&app, 1).await;
    let member = seed_member(&app, "e@example.org").await;

    let (_, created) = send(
        &app,
        Method::POST,
        &format!("/books/{}/loan", book),
        Some(json!({ "member_id": member })),
    )
    .await;
    let loan_id = created["data"]["id"].as_i64().expect("No loan ID");
    let due = date(&created["data"]["due_date"]);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/loans/{}/extend_due_date", loan_id),
        Some(json!({ "loan_number": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Due date extended successfully.");
    assert_eq!(date(&body["data"]["due_date"]), due.checked_add_days(Days::new(5)).unwrap());

    for bad in [json!({ "loan_number": -1 }), json!({ "loan_number": "soon" }), json!({})] {
        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/loans/{}/extend_due_date", loan_id),
            Some(bad),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["fields"]["loan_number"].is_array());
    }

    let (_, stored) = send(&app, Method::GET, &format!("/loans/{}", loan_id), None).await;
    assert_eq!(date(&stored["due_date"]), due.checked_add_days(Days::new(5)).unwrap());

    let (status, body) = send(
        &app,
        Method::POST,
        "/loans/4242/extend_due_date",
        Some(json!({ "loan_number": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Loan does not exist.");
}

#[tokio::test]
async fn test_member_loans_lists_active_loans() {
    let app = app();
    let kept = seed_book(&app, 1).await;
    let returned = seed_book(&app, 1).await;
    let member = seed_member(&app, "l@example.org").await;

    for book in [kept, returned] {
        send(
            &app,
            Method::POST,
            &format!("/books/{}/loan", book),
            Some(json!({ "member_id": member })),
        )
        .await;
    }
    send(
        &app,
        Method::POST,
        &format!("/books/{}/return_book", returned),
        Some(json!({ "member_id": member })),
    )
    .await;

    let (status, body) = send(&app, Method::GET, &format!("/members/{}/loans", member), None).await;
    assert_eq!(status, StatusCode::OK);
    let loans = body["data"].as_array().expect("No data array");
    assert_eq!(loans.len(), 1);
    assert_eq!(loans[0]["book_id"].as_i64(), Some(kept));

    let (status, _) = send(&app, Method::GET, "/members/777/loans", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_crud_lookups_answer_not_found() {
    let app = app();

    for uri in ["/authors/1", "/books/1", "/members/1", "/loans/1"] {
        let (status, body) = send(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn test_book_list_is_paginated() {
    let app = app();
    for _ in 0..3 {
        seed_book(&app, 1).await;
    }

    let (status, body) = send(&app, Method::GET, "/books?per_page=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["per_page"], 2);
    assert_eq!(body["items"].as_array().map(Vec::len), Some(2));

    let (_, body) = send(&app, Method::GET, "/books?page=2&per_page=2", None).await;
    assert_eq!(body["items"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_active_loan_delete_is_refused() {
    let app = app();
    let book = seed_book(&app, 1).await;
    let member = seed_member(&app, "d@example.org").await;

    let (status, loan) = send(
        &app,
        Method::POST,
        "/loans",
        Some(json!({ "book_id": book, "member_id": member })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(available_copies(&app, book).await, 0);

    let (status, _) = send(&app, Method::DELETE, &format!("/loans/{}", loan["id"]), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    send(
        &app,
        Method::POST,
        &format!("/books/{}/return_book", book),
        Some(json!({ "member_id": member })),
    )
    .await;
    let (status, _) = send(&app, Method::DELETE, &format!("/loans/{}", loan["id"]), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_holders_cannot_be_deleted() {
    let app = app();
    let book = seed_book(&app, 1).await;
    let member = seed_member(&app, "holder@example.org").await;

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/books/{}/loan", book),
        Some(json!({ "member_id": member })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    for uri in [format!("/members/{}", member), format!("/books/{}", book)] {
        let (status, body) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"], "Active loans must be returned before deletion.");
    }
    assert_eq!(available_copies(&app, book).await, 0);

    let (_, loans) = send(&app, Method::GET, &format!("/members/{}/loans", member), None).await;
    assert_eq!(loans["data"].as_array().map(Vec::len), Some(1));

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/books/{}/return_book", book),
        Some(json!({ "member_id": member })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::DELETE, &format!("/members/{}", member), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(available_copies(&app, book).await, 1);
}

#[tokio::test]
async fn test_far_pages_are_empty() {
    let app = app();
    seed_book(&app, 1).await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/books?page=9223372036854775807&per_page=100",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["page"], i64::from(i32::MAX));
    assert_eq!(body["items"].as_array().map(Vec::len), Some(0));

    let (status, body) = send(&app, Method::GET, "/books?page=abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert!(body["fields"]["query"].is_array());
}

#[tokio::test]
async fn test_malformed_bodies_answer_with_error_body() {
    let app = app();
    let book = seed_book(&app, 1).await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/books/{}/loan", book),
        Some(json!({ "member_id": "abc" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert!(body["fields"]["body"].is_array());

    let (status, body) = send_raw(
        &app,
        Method::POST,
        &format!("/books/{}/return_book", book),
        Body::from("member_id=1"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) =
        send_raw(&app, Method::POST, "/loans/1/extend_due_date", Body::from("{")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    assert_eq!(available_copies(&app, book).await, 1);
}

struct ChannelNotifier(mpsc::UnboundedSender<i32>);

#[async_trait]
impl LoanNotifier for ChannelNotifier {
    async fn notify(&self, loan_id: i32) -> AppResult<()> {
        let _ = self.0.send(loan_id);
        Ok(())
    }
}

#[tokio::test]
async fn test_loan_triggers_notification() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let app = app_with(NotificationDispatcher::new(Arc::new(ChannelNotifier(tx))));
    let book = seed_book(&app, 1).await;
    let member = seed_member(&app, "n@example.org").await;

    let (_, body) = send(
        &app,
        Method::POST,
        &format!("/books/{}/loan", book),
        Some(json!({ "member_id": member })),
    )
    .await;

    let notified = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("Notification not delivered");
    assert_eq!(notified.map(i64::from), body["data"]["id"].as_i64());

    // Returns do not notify
    send(
        &app,
        Method::POST,
        &format!("/books/{}/return_book", book),
        Some(json!({ "member_id": member })),
    )
    .await;
    assert!(tokio::time::timeout(Duration::from_millis(50), rx.recv()).await.is_err());
}
