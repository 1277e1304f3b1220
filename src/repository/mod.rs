//! Repository layer: the storage capabilities the lending core consumes.
//!
//! Every lending operation runs inside one [`Transaction`]. Row holds taken
//! through [`InventoryStore::read_book_exclusive`] or
//! [`LoanStore::read_loan_exclusive`], and rows touched by a version-checked
//! write, stay held until the transaction commits or rolls back.

pub mod books;
pub mod loans;
pub mod members;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{BookInventory, Loan, Member, NewLoan},
};

pub use memory::{MemoryStore, MemoryTransaction};

/// Result of a version-checked inventory write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The write landed; `version` is the new stamp
    Written { version: i64 },
    /// Another writer changed the row since it was read
    VersionConflict,
}

/// Book copy counters
#[async_trait]
pub trait InventoryStore: Send {
    /// Read without taking any hold
    async fn read_book(&mut self, book_id: i64) -> AppResult<BookInventory>;

    /// Read and hold the row exclusively until the transaction ends
    async fn read_book_exclusive(&mut self, book_id: i64) -> AppResult<BookInventory>;

    /// Set `available_copies` if the stored version still equals `expected_version`
    async fn write_book(
        &mut self,
        book_id: i64,
        available_copies: i32,
        expected_version: i64,
    ) -> AppResult<WriteOutcome>;
}

/// Loan records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoanStore: Send {
    async fn count_loans(&mut self, member_id: i64, active_only: bool) -> AppResult<i64>;

    /// Whether the member has an active loan due before `as_of`
    async fn exists_overdue(&mut self, member_id: i64, as_of: DateTime<Utc>) -> AppResult<bool>;

    async fn create_loan(&mut self, loan: NewLoan) -> AppResult<Loan>;

    async fn read_loan(&mut self, loan_id: i64) -> AppResult<Loan>;

    /// Read and hold the loan row exclusively until the transaction ends
    async fn read_loan_exclusive(&mut self, loan_id: i64) -> AppResult<Loan>;

    /// Set `returned_at` if the loan is still active; `None` if it was already returned
    async fn mark_returned(
        &mut self,
        loan_id: i64,
        returned_at: DateTime<Utc>,
    ) -> AppResult<Option<Loan>>;

    /// Loans of a member, newest first
    async fn member_loans(&mut self, member_id: i64, active_only: bool) -> AppResult<Vec<Loan>>;

    /// Every loan, newest first
    async fn all_loans(&mut self) -> AppResult<Vec<Loan>>;
}

/// Member lookup
#[async_trait]
pub trait MemberStore: Send {
    async fn find_member(&mut self, member_id: i64) -> AppResult<Member>;
}

/// A unit of work over all stores
#[async_trait]
pub trait Transaction: InventoryStore + LoanStore + MemberStore + Send + 'static {
    async fn commit(self) -> AppResult<()>;
    async fn rollback(self) -> AppResult<()>;
}

/// Source of transactions
#[async_trait]
pub trait Database: Send + Sync + 'static {
    type Tx: Transaction;

    async fn begin(&self) -> AppResult<Self::Tx>;
}

/// PostgreSQL database holding the connection pool
#[derive(Clone)]
pub struct PgDatabase {
    pub pool: Pool<Postgres>,
}

impl PgDatabase {
    /// Create a new database handle with the given pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Open PostgreSQL transaction (READ COMMITTED)
pub struct PgTransaction {
    pub(crate) tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Database for PgDatabase {
    type Tx = PgTransaction;

    async fn begin(&self) -> AppResult<PgTransaction> {
        Ok(PgTransaction {
            tx: self.pool.begin().await?,
        })
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn commit(self) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> AppResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
