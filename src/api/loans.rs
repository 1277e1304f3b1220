//! Loan management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{error::AppResult, models::Loan, AppState};

use super::AuthenticatedUser;

/// Loan as returned by the API
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoanResponse {
    pub id: i64,
    pub book_id: i64,
    pub member_id: i64,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    /// Set once the copy is back
    pub returned_at: Option<DateTime<Utc>>,
    /// Active and past its due date
    pub overdue: bool,
    /// Returned after its due date
    pub returned_late: bool,
}

impl From<Loan> for LoanResponse {
    fn from(loan: Loan) -> Self {
        let overdue = loan.is_overdue(Utc::now());
        let returned_late = loan.returned_late();
        Self {
            id: loan.id,
            book_id: loan.book_id,
            member_id: loan.member_id,
            borrowed_at: loan.borrowed_at,
            due_at: loan.due_at,
            returned_at: loan.returned_at,
            overdue,
            returned_late,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MemberLoansQuery {
    /// Only loans not yet returned
    #[serde(default)]
    pub active_only: bool,
}

/// Borrow a copy of a book
#[utoipa::path(
    post,
    path = "/books/{book_id}/borrow",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("book_id" = i64, Path, description = "Book ID")
    ),
    responses(
        (status = 201, description = "Loan created", body = LoanResponse),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorResponse),
        (status = 404, description = "Book or member not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Concurrent update, retry later", body = crate::error::ErrorResponse),
        (status = 422, description = "No copy available, loan limit reached or overdue loans", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow_book(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(book_id): Path<i64>,
) -> AppResult<(StatusCode, Json<LoanResponse>)> {
    let loan = state.services.loans.borrow(book_id, &caller).await?;
    Ok((StatusCode::CREATED, Json(loan.into())))
}

/// Return a borrowed copy
#[utoipa::path(
    post,
    path = "/loans/{loan_id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("loan_id" = i64, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Copy returned", body = LoanResponse),
        (status = 400, description = "Loan already returned", body = crate::error::ErrorResponse),
        (status = 403, description = "Loan belongs to another member", body = crate::error::ErrorResponse),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_loan(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(loan_id): Path<i64>,
) -> AppResult<Json<LoanResponse>> {
    let loan = state.services.loans.return_loan(loan_id, &caller).await?;
    Ok(Json(loan.into()))
}

/// Get a single loan
#[utoipa::path(
    get,
    path = "/loans/{loan_id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("loan_id" = i64, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = LoanResponse),
        (status = 403, description = "Loan belongs to another member", body = crate::error::ErrorResponse),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_loan(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(loan_id): Path<i64>,
) -> AppResult<Json<LoanResponse>> {
    let loan = state.services.loans.get_loan(loan_id, &caller).await?;
    Ok(Json(loan.into()))
}

/// Loans of the authenticated member, newest first
#[utoipa::path(
    get,
    path = "/members/me/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(MemberLoansQuery),
    responses(
        (status = 200, description = "Member's loans", body = Vec<LoanResponse>),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorResponse)
    )
)]
pub async fn my_loans(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Query(query): Query<MemberLoansQuery>,
) -> AppResult<Json<Vec<LoanResponse>>> {
    let loans = state
        .services
        .loans
        .member_loans(&caller, query.active_only)
        .await?;
    Ok(Json(loans.into_iter().map(LoanResponse::from).collect()))
}

/// Every loan in the library, newest first (admin only)
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All loans", body = Vec<LoanResponse>),
        (status = 403, description = "Caller is not an administrator", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_loans(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanResponse>>> {
    let loans = state.services.loans.all_loans(&caller).await?;
    Ok(Json(loans.into_iter().map(LoanResponse::from).collect()))
}
