//! Booklender Library Lending Server
//!
//! Members borrow and return physical copies of books over a REST JSON API.
//! Copy counters are protected by an adaptive locking scheme: version-checked
//! writes while a book is plentiful, exclusive row holds once it is scarce.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Lending
        .route("/books/:book_id/borrow", post(api::loans::borrow_book))
        .route("/loans", get(api::loans::list_loans))
        .route("/loans/:loan_id", get(api::loans::get_loan))
        .route("/loans/:loan_id/return", post(api::loans::return_loan))
        .route("/members/me/loans", get(api::loans::my_loans))
        .with_state(state);

    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
