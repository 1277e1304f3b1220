//! API tests driving the router in-process

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use booklender_server::{
    config::AppConfig,
    create_router,
    models::{MemberClaims, Role},
    repository::{Database, MemoryStore},
    services::Services,
    AppState,
};

use crate::common::{lending_config, library, OfflineDatabase};

fn app_over<D: Database>(database: D) -> (Router, AppConfig) {
    let config = AppConfig {
        lending: lending_config(),
        ..Default::default()
    };
    let state = AppState {
        services: Arc::new(Services::new(database, &config.lending)),
        config: Arc::new(config.clone()),
    };
    (create_router(state), config)
}

fn app(store: &MemoryStore) -> (Router, AppConfig) {
    app_over(store.clone())
}

fn token(config: &AppConfig, member_id: i64, role: Role) -> String {
    MemberClaims::new(member_id, role, chrono::Duration::hours(1))
        .create_token(&config.auth.jwt_secret)
        .unwrap()
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(AUTHORIZATION, format!("Bearer {}", token));
    }

    let response = app
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = app(&MemoryStore::new());

    let (status, body) = send(&app, Method::GET, "/api/v1/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_borrow_requires_token() {
    let store = library(1, 2, 2);
    let (app, _) = app(&store);

    let (status, body) = send(&app, Method::POST, "/api/v1/books/1/borrow", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "NotAuthorized");
    assert_eq!(store.book(1).unwrap().available_copies, 2);
}

#[tokio::test]
async fn test_borrow_with_forged_token_is_rejected() {
    let store = library(1, 2, 2);
    let (app, _) = app(&store);
    let forged = MemberClaims::new(1, Role::Admin, chrono::Duration::hours(1))
        .create_token("not-the-server-secret")
        .unwrap();

    let (status, _) = send(&app, Method::POST, "/api/v1/books/1/borrow", Some(&forged)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_borrow_and_return_round_trip() {
    let store = library(1, 2, 2);
    let (app, config) = app(&store);
    let member = token(&config, 1, Role::Member);

    let (status, loan) = send(&app, Method::POST, "/api/v1/books/1/borrow", Some(&member)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(loan["book_id"], 1);
    assert_eq!(loan["member_id"], 1);
    assert_eq!(loan["returned_at"], Value::Null);
    assert_eq!(loan["overdue"], false);
    assert_eq!(store.book(1).unwrap().available_copies, 1);

    let loan_id = loan["id"].as_i64().unwrap();
    let (status, fetched) = send(&app, Method::GET, &format!("/api/v1/loans/{}", loan_id), Some(&member)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], loan_id);

    let uri = format!("/api/v1/loans/{}/return", loan_id);
    let (status, returned) = send(&app, Method::POST, &uri, Some(&member)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(returned["returned_at"].is_string());
    assert_eq!(returned["returned_late"], false);
    assert_eq!(store.book(1).unwrap().available_copies, 2);

    let (status, body) = send(&app, Method::POST, &uri, Some(&member)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "LoanAlreadyReturned");
    assert_eq!(body["retryable"], false);
}

#[tokio::test]
async fn test_unavailable_book_is_unprocessable() {
    let store = library(1, 1, 0);
    let (app, config) = app(&store);
    let member = token(&config, 1, Role::Member);

    let (status, body) = send(&app, Method::POST, "/api/v1/books/1/borrow", Some(&member)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "BookNotAvailable");
    assert!(store.loans().is_empty());
}

#[tokio::test]
async fn test_unknown_book_is_not_found() {
    let store = library(1, 1, 1);
    let (app, config) = app(&store);
    let member = token(&config, 1, Role::Member);

    let (status, body) = send(&app, Method::POST, "/api/v1/books/99/borrow", Some(&member)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");
}

#[tokio::test]
async fn test_return_of_other_members_loan_is_forbidden() {
    let store = library(2, 2, 2);
    let (app, config) = app(&store);
    let owner = token(&config, 1, Role::Member);
    let stranger = token(&config, 2, Role::Member);
    let admin = token(&config, 2, Role::Admin);

    let (_, loan) = send(&app, Method::POST, "/api/v1/books/1/borrow", Some(&owner)).await;
    let uri = format!("/api/v1/loans/{}/return", loan["id"]);

    let (status, body) = send(&app, Method::POST, &uri, Some(&stranger)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "AccessDenied");
    assert_eq!(store.book(1).unwrap().available_copies, 1);

    let (status, _) = send(&app, Method::POST, &uri, Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.book(1).unwrap().available_copies, 2);
}

#[tokio::test]
async fn test_my_loans_filters_active() {
    let store = library(1, 5, 5);
    let (app, config) = app(&store);
    let member = token(&config, 1, Role::Member);

    let (_, first) = send(&app, Method::POST, "/api/v1/books/1/borrow", Some(&member)).await;
    send(&app, Method::POST, "/api/v1/books/1/borrow", Some(&member)).await;
    let uri = format!("/api/v1/loans/{}/return", first["id"]);
    send(&app, Method::POST, &uri, Some(&member)).await;

    let (status, all) = send(&app, Method::GET, "/api/v1/members/me/loans", Some(&member)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (status, active) = send(
        &app,
        Method::GET,
        "/api/v1/members/me/loans?active_only=true",
        Some(&member),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let active = active.as_array().unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["returned_at"], Value::Null);
}

#[tokio::test]
async fn test_readiness_reflects_store() {
    let (app, _) = app(&MemoryStore::new());
    let (status, body) = send(&app, Method::GET, "/api/v1/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");

    let (offline, _) = app_over(OfflineDatabase);
    let (status, body) = send(&offline, Method::GET, "/api/v1/ready", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unavailable");
}

#[tokio::test]
async fn test_listing_all_loans_is_admin_only() {
    let store = library(2, 5, 5);
    let (app, config) = app(&store);
    let first = token(&config, 1, Role::Member);
    let second = token(&config, 2, Role::Member);
    let admin = token(&config, 3, Role::Admin);

    send(&app, Method::POST, "/api/v1/books/1/borrow", Some(&first)).await;
    send(&app, Method::POST, "/api/v1/books/1/borrow", Some(&second)).await;

    let (status, body) = send(&app, Method::GET, "/api/v1/loans", Some(&first)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "AccessDenied");

    let (status, all) = send(&app, Method::GET, "/api/v1/loans", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    let members: Vec<i64> = all
        .as_array()
        .unwrap()
        .iter()
        .map(|loan| loan["member_id"].as_i64().unwrap())
        .collect();
    assert_eq!(members, vec![2, 1]);
}
