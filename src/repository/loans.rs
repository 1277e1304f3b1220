//! Loans repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{LoanStore, PgTransaction};
use crate::{
    error::{AppError, AppResult},
    models::{Loan, NewLoan},
};

const LOAN_COLUMNS: &str = "id, book_id, member_id, borrowed_at, due_at, returned_at";

fn loan_not_found(loan_id: i64) -> AppError {
    AppError::NotFound(format!("Loan with id {} not found", loan_id))
}

#[async_trait]
impl LoanStore for PgTransaction {
    async fn count_loans(&mut self, member_id: i64, active_only: bool) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE member_id = $1 AND (NOT $2 OR returned_at IS NULL)",
        )
        .bind(member_id)
        .bind(active_only)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn exists_overdue(&mut self, member_id: i64, as_of: DateTime<Utc>) -> AppResult<bool> {
        let overdue: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM loans
                WHERE member_id = $1 AND returned_at IS NULL AND due_at < $2
            )
            "#,
        )
        .bind(member_id)
        .bind(as_of)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(overdue)
    }

    async fn create_loan(&mut self, loan: NewLoan) -> AppResult<Loan> {
        let created = sqlx::query_as::<_, Loan>(&format!(
            r#"
            INSERT INTO loans (book_id, member_id, borrowed_at, due_at)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            LOAN_COLUMNS
        ))
        .bind(loan.book_id)
        .bind(loan.member_id)
        .bind(loan.borrowed_at)
        .bind(loan.due_at)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(created)
    }

    async fn read_loan(&mut self, loan_id: i64) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>(&format!("SELECT {} FROM loans WHERE id = $1", LOAN_COLUMNS))
            .bind(loan_id)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| loan_not_found(loan_id))
    }

    async fn read_loan_exclusive(&mut self, loan_id: i64) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans WHERE id = $1 FOR UPDATE",
            LOAN_COLUMNS
        ))
        .bind(loan_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| loan_not_found(loan_id))
    }

    async fn mark_returned(
        &mut self,
        loan_id: i64,
        returned_at: DateTime<Utc>,
    ) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(&format!(
            r#"
            UPDATE loans SET returned_at = $2, updated_at = NOW()
            WHERE id = $1 AND returned_at IS NULL
            RETURNING {}
            "#,
            LOAN_COLUMNS
        ))
        .bind(loan_id)
        .bind(returned_at)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(loan)
    }

    async fn member_loans(&mut self, member_id: i64, active_only: bool) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(&format!(
            r#"
            SELECT {} FROM loans
            WHERE member_id = $1 AND (NOT $2 OR returned_at IS NULL)
            ORDER BY borrowed_at DESC, id DESC
            "#,
            LOAN_COLUMNS
        ))
        .bind(member_id)
        .bind(active_only)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(loans)
    }

    async fn all_loans(&mut self) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans ORDER BY borrowed_at DESC, id DESC",
            LOAN_COLUMNS
        ))
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(loans)
    }
}
