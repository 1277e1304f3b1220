//! Data models for Booklender

pub mod book;
pub mod loan;
pub mod member;

// Re-export commonly used types
pub use book::BookInventory;
pub use loan::{Loan, NewLoan};
pub use member::{CallerIdentity, Member, MemberClaims, Role};
