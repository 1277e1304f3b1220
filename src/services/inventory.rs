//! Copy counter mutations for borrow and return
//!
//! Borrowing decrements `available_copies` with an adaptive strategy:
//!
//! ```text
//! read (no lock) ── 0 left ──────────────────────────────▶ BookNotAvailable
//!   │
//!   ├─ available <= threshold ─▶ exclusive read ─ 0 left ─▶ BookNotAvailable
//!   │                                 └─ write ───────────▶ done
//!   │
//!   └─ available > threshold ──▶ version-checked write ───▶ done
//!                                     └─ conflict ─ sleep, re-read, repeat
//!                                        (up to RetryPolicy::max_attempts)
//! ```
//!
//! Returns always take the exclusive hold.

use std::time::Duration;

use crate::{
    config::LendingConfig,
    error::{AppError, AppResult},
    models::BookInventory,
    repository::{InventoryStore, WriteOutcome},
    services::lock_strategy::{select_strategy, LockStrategy},
};

/// Bounded retry for version-checked writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Fixed pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// A single attempt, no retry
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn from_config(config: &LendingConfig) -> Self {
        Self::new(config.optimistic_max_attempts, config.retry_delay())
    }
}

/// Applies borrow and return mutations to a book's copy counters
#[derive(Debug, Clone)]
pub struct InventoryMutator {
    low_inventory_threshold: i32,
    retry: RetryPolicy,
}

impl InventoryMutator {
    pub fn new(low_inventory_threshold: i32, retry: RetryPolicy) -> Self {
        Self {
            low_inventory_threshold,
            retry,
        }
    }

    pub fn from_config(config: &LendingConfig) -> Self {
        Self::new(config.low_inventory_threshold, RetryPolicy::from_config(config))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Reserve one copy of `book_id`, returning the book as written
    pub async fn decrement<S>(&self, store: &mut S, book_id: i64) -> AppResult<BookInventory>
    where
        S: InventoryStore + ?Sized,
    {
        let mut book = store.read_book(book_id).await?;
        let mut attempt = 1;

        loop {
            if !book.is_available() {
                tracing::warn!(book_id, "Book has no copies available");
                return Err(AppError::BookNotAvailable { book_id });
            }

            let strategy = select_strategy(book.available_copies, self.low_inventory_threshold);
            tracing::debug!(
                book_id,
                available = book.available_copies,
                threshold = self.low_inventory_threshold,
                %strategy,
                attempt,
                "Selected lock strategy"
            );

            if strategy == LockStrategy::Pessimistic {
                return self.decrement_locked(store, book_id).await;
            }

            let outcome = store
                .write_book(book_id, book.available_copies - 1, book.version)
                .await?;

            match outcome {
                WriteOutcome::Written { version } => {
                    return Ok(BookInventory {
                        available_copies: book.available_copies - 1,
                        version,
                        ..book
                    });
                }
                WriteOutcome::VersionConflict if attempt < self.retry.max_attempts => {
                    tracing::warn!(
                        book_id,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        "Concurrent update on book, retrying decrement"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                    attempt += 1;
                    book = store.read_book(book_id).await?;
                }
                WriteOutcome::VersionConflict => {
                    tracing::warn!(book_id, attempts = attempt, "Decrement retries exhausted");
                    return Err(AppError::VersionConflict {
                        book_id,
                        attempts: attempt,
                    });
                }
            }
        }
    }

    async fn decrement_locked<S>(&self, store: &mut S, book_id: i64) -> AppResult<BookInventory>
    where
        S: InventoryStore + ?Sized,
    {
        let book = store.read_book_exclusive(book_id).await?;

        // May have been taken between the unlocked read and the hold
        if !book.is_available() {
            tracing::warn!(book_id, "Book became unavailable after acquiring lock");
            return Err(AppError::BookNotAvailable { book_id });
        }

        let available_copies = book.available_copies - 1;
        self.write_held(store, book, available_copies).await
    }

    /// Give back one copy of `book_id` under an exclusive hold
    pub async fn increment<S>(&self, store: &mut S, book_id: i64) -> AppResult<BookInventory>
    where
        S: InventoryStore + ?Sized,
    {
        let book = store.read_book_exclusive(book_id).await?;
        let available_copies = book.available_copies + 1;
        self.write_held(store, book, available_copies).await
    }

    async fn write_held<S>(
        &self,
        store: &mut S,
        book: BookInventory,
        available_copies: i32,
    ) -> AppResult<BookInventory>
    where
        S: InventoryStore + ?Sized,
    {
        match store.write_book(book.id, available_copies, book.version).await? {
            WriteOutcome::Written { version } => Ok(BookInventory {
                available_copies,
                version,
                ..book
            }),
            // Only possible if the hold was not honoured by the store
            WriteOutcome::VersionConflict => Err(AppError::VersionConflict {
                book_id: book.id,
                attempts: 1,
            }),
        }
    }
}
