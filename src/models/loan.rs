//! Loan (borrow) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Loan model from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Loan {
    pub id: i64,
    pub book_id: i64,
    pub member_id: i64,
    pub borrowed_at: DateTime<Utc>,
    /// Fixed at creation, never recomputed
    pub due_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl Loan {
    /// A loan is active until its return is recorded
    pub fn is_active(&self) -> bool {
        self.returned_at.is_none()
    }

    /// Active and past its due date
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.due_at < now
    }

    /// Returned after its due date
    pub fn returned_late(&self) -> bool {
        self.returned_at.is_some_and(|returned_at| returned_at > self.due_at)
    }
}

/// Loan to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLoan {
    pub book_id: i64,
    pub member_id: i64,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
}
