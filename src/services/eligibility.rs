//! Borrowing eligibility rules

use chrono::{DateTime, Utc};

use crate::{
    config::LendingConfig,
    error::{AppError, AppResult},
    repository::LoanStore,
};

/// Per-member checks run before any inventory is touched.
///
/// The reads are advisory: concurrent borrows by one member may briefly
/// exceed the cap, the inventory decrement being the only hard boundary.
#[derive(Debug, Clone)]
pub struct EligibilityRules {
    pub max_active_loans: i64,
    pub enforce_overdue_restriction: bool,
}

impl EligibilityRules {
    pub fn new(max_active_loans: i64, enforce_overdue_restriction: bool) -> Self {
        Self {
            max_active_loans,
            enforce_overdue_restriction,
        }
    }

    pub fn from_config(config: &LendingConfig) -> Self {
        Self::new(config.max_active_loans, config.enforce_overdue_restriction)
    }

    /// Loan cap first, then the overdue restriction; the first failure is returned
    pub async fn check<L>(&self, loans: &mut L, member_id: i64, now: DateTime<Utc>) -> AppResult<()>
    where
        L: LoanStore + ?Sized,
    {
        let active = loans.count_loans(member_id, true).await?;
        if active >= self.max_active_loans {
            tracing::warn!(
                member_id,
                active,
                limit = self.max_active_loans,
                "Member has reached maximum active loans"
            );
            return Err(AppError::LoanLimitExceeded {
                active,
                limit: self.max_active_loans,
            });
        }

        if self.enforce_overdue_restriction && loans.exists_overdue(member_id, now).await? {
            tracing::warn!(member_id, "Member has overdue loans and cannot borrow");
            return Err(AppError::OverdueRestriction);
        }

        Ok(())
    }
}
