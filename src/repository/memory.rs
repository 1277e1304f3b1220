//! In-process store with the same locking semantics as the PostgreSQL one.
//!
//! Intended for tests and for running without a database. Reads outside a
//! hold see committed rows only. Writes are staged in the transaction and
//! published on commit; a row written or read exclusively stays held until
//! the transaction ends, so a second writer waits and then observes the
//! committed version.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

use super::{Database, InventoryStore, LoanStore, MemberStore, Transaction, WriteOutcome};
use crate::{
    error::{AppError, AppResult},
    models::{BookInventory, Loan, Member, NewLoan},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Book(i64),
    Loan(i64),
}

#[derive(Default)]
struct Tables {
    books: HashMap<i64, BookInventory>,
    members: HashMap<i64, Member>,
    loans: BTreeMap<i64, Loan>,
}

#[derive(Default)]
struct Shared {
    tables: Mutex<Tables>,
    row_locks: Mutex<HashMap<RowKey, Arc<RowLock<()>>>>,
    last_loan_id: AtomicI64,
}

impl Shared {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn row_lock(&self, key: RowKey) -> Arc<RowLock<()>> {
        let mut locks = self.row_locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(key).or_default().clone()
    }

    /// Forget row locks nobody holds or waits on
    fn prune_row_locks(&self, keys: impl IntoIterator<Item = RowKey>) {
        let mut locks = self.row_locks.lock().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            if locks.get(&key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
                locks.remove(&key);
            }
        }
    }

    fn next_loan_id(&self) -> i64 {
        self.last_loan_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Shared in-memory database; clones share the same tables
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a member
    pub fn add_member(&self, id: i64, name: &str, email: &str) {
        self.shared.tables().members.insert(
            id,
            Member {
                id,
                name: name.to_string(),
                email: email.to_string(),
            },
        );
    }

    /// Insert or replace a book's counters
    pub fn add_book(&self, book: BookInventory) {
        self.shared.tables().books.insert(book.id, book);
    }

    /// Insert a committed loan, e.g. one borrowed before the store was seeded
    pub fn add_loan(&self, loan: NewLoan) -> Loan {
        let loan = Loan {
            id: self.shared.next_loan_id(),
            book_id: loan.book_id,
            member_id: loan.member_id,
            borrowed_at: loan.borrowed_at,
            due_at: loan.due_at,
            returned_at: None,
        };
        self.shared.tables().loans.insert(loan.id, loan.clone());
        loan
    }

    /// Committed state of a book
    pub fn book(&self, book_id: i64) -> Option<BookInventory> {
        self.shared.tables().books.get(&book_id).cloned()
    }

    /// Committed state of a loan
    pub fn loan(&self, loan_id: i64) -> Option<Loan> {
        self.shared.tables().loans.get(&loan_id).cloned()
    }

    /// All committed loans, by id
    pub fn loans(&self) -> Vec<Loan> {
        self.shared.tables().loans.values().cloned().collect()
    }
}

#[async_trait]
impl Database for MemoryStore {
    type Tx = MemoryTransaction;

    async fn begin(&self) -> AppResult<MemoryTransaction> {
        Ok(MemoryTransaction {
            shared: self.shared.clone(),
            held: HashMap::new(),
            book_writes: HashMap::new(),
            loan_writes: BTreeMap::new(),
        })
    }
}

/// Open in-memory transaction; dropping it rolls back
pub struct MemoryTransaction {
    shared: Arc<Shared>,
    held: HashMap<RowKey, OwnedMutexGuard<()>>,
    book_writes: HashMap<i64, BookInventory>,
    loan_writes: BTreeMap<i64, Loan>,
}

impl MemoryTransaction {
    async fn hold(&mut self, key: RowKey) {
        if self.held.contains_key(&key) {
            return;
        }
        let lock = self.shared.row_lock(key);
        let guard = lock.lock_owned().await;
        self.held.insert(key, guard);
    }

    fn current_book(&self, book_id: i64) -> AppResult<BookInventory> {
        if let Some(book) = self.book_writes.get(&book_id) {
            return Ok(book.clone());
        }
        self.shared
            .tables()
            .books
            .get(&book_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))
    }

    fn current_loan(&self, loan_id: i64) -> AppResult<Loan> {
        if let Some(loan) = self.loan_writes.get(&loan_id) {
            return Ok(loan.clone());
        }
        self.shared
            .tables()
            .loans
            .get(&loan_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))
    }

    /// Committed loans overlaid with this transaction's writes, optionally
    /// restricted to one member
    fn visible_loans(&self, member_id: Option<i64>, active_only: bool) -> Vec<Loan> {
        let belongs = |loan: &Loan| member_id.map_or(true, |id| loan.member_id == id);

        let mut loans: BTreeMap<i64, Loan> = self
            .shared
            .tables()
            .loans
            .iter()
            .filter(|(_, loan)| belongs(loan))
            .map(|(id, loan)| (*id, loan.clone()))
            .collect();

        for (id, loan) in &self.loan_writes {
            if belongs(loan) {
                loans.insert(*id, loan.clone());
            }
        }

        loans
            .into_values()
            .filter(|loan| !active_only || loan.is_active())
            .collect()
    }
}

#[async_trait]
impl InventoryStore for MemoryTransaction {
    async fn read_book(&mut self, book_id: i64) -> AppResult<BookInventory> {
        self.current_book(book_id)
    }

    async fn read_book_exclusive(&mut self, book_id: i64) -> AppResult<BookInventory> {
        self.hold(RowKey::Book(book_id)).await;
        self.current_book(book_id)
    }

    async fn write_book(
        &mut self,
        book_id: i64,
        available_copies: i32,
        expected_version: i64,
    ) -> AppResult<WriteOutcome> {
        let key = RowKey::Book(book_id);
        let newly_held = !self.held.contains_key(&key);
        self.hold(key).await;

        let current = self.current_book(book_id)?;
        if current.version != expected_version {
            // A write that matched no row leaves nothing locked
            if newly_held {
                self.held.remove(&key);
                self.shared.prune_row_locks([key]);
            }
            return Ok(WriteOutcome::VersionConflict);
        }
        if !current.accepts(available_copies) {
            return Err(AppError::Internal(format!(
                "Book {} available copies {} outside 0..={}",
                book_id, available_copies, current.total_copies
            )));
        }

        let version = current.version + 1;
        self.book_writes.insert(
            book_id,
            BookInventory {
                available_copies,
                version,
                ..current
            },
        );
        Ok(WriteOutcome::Written { version })
    }
}

#[async_trait]
impl LoanStore for MemoryTransaction {
    async fn count_loans(&mut self, member_id: i64, active_only: bool) -> AppResult<i64> {
        Ok(self.visible_loans(Some(member_id), active_only).len() as i64)
    }

    async fn exists_overdue(&mut self, member_id: i64, as_of: DateTime<Utc>) -> AppResult<bool> {
        Ok(self
            .visible_loans(Some(member_id), true)
            .iter()
            .any(|loan| loan.due_at < as_of))
    }

    async fn create_loan(&mut self, loan: NewLoan) -> AppResult<Loan> {
        let loan = Loan {
            id: self.shared.next_loan_id(),
            book_id: loan.book_id,
            member_id: loan.member_id,
            borrowed_at: loan.borrowed_at,
            due_at: loan.due_at,
            returned_at: None,
        };
        self.loan_writes.insert(loan.id, loan.clone());
        Ok(loan)
    }

    async fn read_loan(&mut self, loan_id: i64) -> AppResult<Loan> {
        self.current_loan(loan_id)
    }

    async fn read_loan_exclusive(&mut self, loan_id: i64) -> AppResult<Loan> {
        self.hold(RowKey::Loan(loan_id)).await;
        self.current_loan(loan_id)
    }

    async fn mark_returned(
        &mut self,
        loan_id: i64,
        returned_at: DateTime<Utc>,
    ) -> AppResult<Option<Loan>> {
        self.hold(RowKey::Loan(loan_id)).await;

        let mut loan = self.current_loan(loan_id)?;
        if !loan.is_active() {
            return Ok(None);
        }
        loan.returned_at = Some(returned_at);
        self.loan_writes.insert(loan_id, loan.clone());
        Ok(Some(loan))
    }

    async fn member_loans(&mut self, member_id: i64, active_only: bool) -> AppResult<Vec<Loan>> {
        Ok(newest_first(self.visible_loans(Some(member_id), active_only)))
    }

    async fn all_loans(&mut self) -> AppResult<Vec<Loan>> {
        Ok(newest_first(self.visible_loans(None, false)))
    }
}

fn newest_first(mut loans: Vec<Loan>) -> Vec<Loan> {
    loans.sort_by(|a, b| b.borrowed_at.cmp(&a.borrowed_at).then(b.id.cmp(&a.id)));
    loans
}

#[async_trait]
impl MemberStore for MemoryTransaction {
    async fn find_member(&mut self, member_id: i64) -> AppResult<Member> {
        self.shared
            .tables()
            .members
            .get(&member_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", member_id)))
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn commit(mut self) -> AppResult<()> {
        let mut tables = self.shared.tables();
        for (id, book) in self.book_writes.drain() {
            tables.books.insert(id, book);
        }
        for (id, loan) in std::mem::take(&mut self.loan_writes) {
            tables.loans.insert(id, loan);
        }
        drop(tables);
        // Holds are released when `self` drops, after the writes are visible
        Ok(())
    }

    async fn rollback(self) -> AppResult<()> {
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        let released: Vec<RowKey> = self.held.drain().map(|(key, _guard)| key).collect();
        self.shared.prune_row_locks(released);
    }
}
