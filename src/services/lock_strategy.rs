//! Lock selection for inventory decrements

use std::fmt;

/// How a borrow reserves its copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStrategy {
    /// Version-checked write, retried on conflict
    Optimistic,
    /// Exclusive row hold for the rest of the transaction
    Pessimistic,
}

impl fmt::Display for LockStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockStrategy::Optimistic => write!(f, "optimistic"),
            LockStrategy::Pessimistic => write!(f, "pessimistic"),
        }
    }
}

/// Scarce books (at or below `threshold` copies left) are contended, so
/// they are locked; plentiful ones use version-checked writes.
pub fn select_strategy(available_copies: i32, threshold: i32) -> LockStrategy {
    if available_copies <= threshold {
        LockStrategy::Pessimistic
    } else {
        LockStrategy::Optimistic
    }
}
