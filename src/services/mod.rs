//! Business logic services

pub mod eligibility;
pub mod inventory;
pub mod loan_records;
pub mod loans;
pub mod lock_strategy;

use std::sync::Arc;

use crate::{config::LendingConfig, repository::Database};

pub use loans::{LoanOperations, LoansService};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub loans: Arc<dyn LoanOperations>,
}

impl Services {
    /// Create all services over the given database
    pub fn new<D: Database>(database: D, lending: &LendingConfig) -> Self {
        Self {
            loans: Arc::new(LoansService::new(database, lending)),
        }
    }
}
