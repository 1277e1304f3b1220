//! Book inventory model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Copy counters of a book as seen by the lending core.
///
/// `version` is an opaque counter bumped on every write and compared by
/// equality for version-checked writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct BookInventory {
    pub id: i64,
    pub total_copies: i32,
    pub available_copies: i32,
    pub version: i64,
}

impl BookInventory {
    pub fn new(id: i64, total_copies: i32, available_copies: i32) -> Self {
        Self {
            id,
            total_copies,
            available_copies,
            version: 0,
        }
    }

    pub fn is_available(&self) -> bool {
        self.available_copies > 0
    }

    /// Copies currently out on loan
    pub fn reserved_copies(&self) -> i32 {
        self.total_copies - self.available_copies
    }

    /// Whether `available` is a legal counter value for this book
    pub fn accepts(&self, available: i32) -> bool {
        (0..=self.total_copies).contains(&available)
    }
}
