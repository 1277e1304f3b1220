//! Loan record lifecycle

use chrono::{DateTime, Duration, Utc};

use crate::{
    config::LendingConfig,
    error::{AppError, AppResult},
    models::{Loan, NewLoan},
    repository::LoanStore,
};

/// Creates loans after a successful decrement and closes them on return
#[derive(Debug, Clone)]
pub struct LoanRecords {
    loan_duration: Duration,
}

impl LoanRecords {
    pub fn new(loan_duration_days: i64) -> Self {
        Self {
            loan_duration: Duration::days(loan_duration_days),
        }
    }

    pub fn from_config(config: &LendingConfig) -> Self {
        Self::new(config.loan_duration_days)
    }

    pub fn due_at(&self, borrowed_at: DateTime<Utc>) -> DateTime<Utc> {
        borrowed_at + self.loan_duration
    }

    pub async fn create_loan<L>(
        &self,
        loans: &mut L,
        book_id: i64,
        member_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Loan>
    where
        L: LoanStore + ?Sized,
    {
        loans
            .create_loan(NewLoan {
                book_id,
                member_id,
                borrowed_at: now,
                due_at: self.due_at(now),
            })
            .await
    }

    /// Record the return; the write only lands on a still-active loan
    pub async fn mark_returned<L>(&self, loans: &mut L, loan: &Loan, now: DateTime<Utc>) -> AppResult<Loan>
    where
        L: LoanStore + ?Sized,
    {
        loans
            .mark_returned(loan.id, now)
            .await?
            .ok_or(AppError::AlreadyReturned { loan_id: loan.id })
    }
}
