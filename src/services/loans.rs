//! Loan management service: borrow and return orchestration
//!
//! Borrow: member resolved → eligibility checked → inventory decremented →
//! loan created, all in one transaction. A rejection at any step rolls the
//! transaction back, so no copy is reserved without a loan and no loan
//! exists without a reserved copy.
//!
//! Return: loan held exclusively → authorization checked → return status
//! validated → inventory incremented → loan marked returned. The hold on the
//! loan row makes a second concurrent return wait and then observe the loan
//! as already returned.

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    config::LendingConfig,
    error::{AppError, AppResult},
    models::{CallerIdentity, Loan},
    repository::{Database, LoanStore, MemberStore, Transaction},
    services::{
        eligibility::EligibilityRules, inventory::InventoryMutator, loan_records::LoanRecords,
    },
};

/// Lending operations exposed to the API layer
#[async_trait]
pub trait LoanOperations: Send + Sync {
    async fn borrow(&self, book_id: i64, caller: &CallerIdentity) -> AppResult<Loan>;

    async fn return_loan(&self, loan_id: i64, caller: &CallerIdentity) -> AppResult<Loan>;

    async fn get_loan(&self, loan_id: i64, caller: &CallerIdentity) -> AppResult<Loan>;

    async fn member_loans(&self, caller: &CallerIdentity, active_only: bool) -> AppResult<Vec<Loan>>;

    async fn all_loans(&self, caller: &CallerIdentity) -> AppResult<Vec<Loan>>;

    /// Whether the store accepts transactions
    async fn ready(&self) -> AppResult<()>;
}

pub struct LoansService<D: Database> {
    database: D,
    eligibility: EligibilityRules,
    inventory: InventoryMutator,
    records: LoanRecords,
}

impl<D: Database> LoansService<D> {
    pub fn new(database: D, config: &LendingConfig) -> Self {
        Self::with_parts(
            database,
            EligibilityRules::from_config(config),
            InventoryMutator::from_config(config),
            LoanRecords::from_config(config),
        )
    }

    pub fn with_parts(
        database: D,
        eligibility: EligibilityRules,
        inventory: InventoryMutator,
        records: LoanRecords,
    ) -> Self {
        Self {
            database,
            eligibility,
            inventory,
            records,
        }
    }

    /// Borrow a book for the calling member
    pub async fn borrow(&self, book_id: i64, caller: &CallerIdentity) -> AppResult<Loan> {
        tracing::debug!(book_id, member_id = caller.principal_id(), "Processing borrow request");

        let mut tx = self.database.begin().await?;
        let result = self.borrow_in(&mut tx, book_id, caller).await;
        let loan = finish(tx, result).await?;

        tracing::info!(
            loan_id = loan.id,
            book_id,
            member_id = loan.member_id,
            due_at = %loan.due_at,
            "Book borrowed"
        );
        Ok(loan)
    }

    async fn borrow_in(
        &self,
        tx: &mut D::Tx,
        book_id: i64,
        caller: &CallerIdentity,
    ) -> AppResult<Loan> {
        let member = tx.find_member(caller.principal_id()).await?;
        let now = Utc::now();

        self.eligibility.check(tx, member.id, now).await?;
        tracing::debug!(book_id, member_id = member.id, "Eligibility checked");

        let book = self.inventory.decrement(tx, book_id).await?;
        tracing::debug!(
            book_id,
            available = book.available_copies,
            version = book.version,
            "Inventory decremented"
        );

        self.records.create_loan(tx, book_id, member.id, now).await
    }

    /// Return a loan on behalf of its member, or any loan for privileged callers
    pub async fn return_loan(&self, loan_id: i64, caller: &CallerIdentity) -> AppResult<Loan> {
        tracing::debug!(loan_id, requester_id = caller.principal_id(), "Processing return request");

        let mut tx = self.database.begin().await?;
        let result = self.return_in(&mut tx, loan_id, caller).await;
        let loan = finish(tx, result).await?;

        if loan.returned_late() {
            tracing::info!(
                loan_id,
                due_at = %loan.due_at,
                returned_at = ?loan.returned_at,
                "Book returned late"
            );
        } else {
            tracing::info!(loan_id, "Book returned on time");
        }
        Ok(loan)
    }

    async fn return_in(
        &self,
        tx: &mut D::Tx,
        loan_id: i64,
        caller: &CallerIdentity,
    ) -> AppResult<Loan> {
        let loan = tx.read_loan_exclusive(loan_id).await?;

        if !caller.may_act_for(loan.member_id) {
            tracing::warn!(
                loan_id,
                requester_id = caller.principal_id(),
                owner_id = loan.member_id,
                "Attempt to return another member's loan"
            );
            return Err(AppError::AccessDenied(
                "You can only return your own loans".to_string(),
            ));
        }
        tracing::debug!(loan_id, "Authorization checked");

        if !loan.is_active() {
            tracing::warn!(loan_id, book_id = loan.book_id, "Loan already returned");
            return Err(AppError::AlreadyReturned { loan_id });
        }
        tracing::debug!(loan_id, "Return status validated");

        let book = self.inventory.increment(tx, loan.book_id).await?;
        tracing::debug!(
            book_id = book.id,
            available = book.available_copies,
            "Inventory incremented"
        );

        self.records.mark_returned(tx, &loan, Utc::now()).await
    }

    /// A single loan, visible to its member and to privileged callers
    pub async fn get_loan(&self, loan_id: i64, caller: &CallerIdentity) -> AppResult<Loan> {
        let mut tx = self.database.begin().await?;
        let result = tx.read_loan(loan_id).await.and_then(|loan| {
            if caller.may_act_for(loan.member_id) {
                Ok(loan)
            } else {
                tracing::warn!(
                    loan_id,
                    requester_id = caller.principal_id(),
                    "Attempt to view another member's loan"
                );
                Err(AppError::AccessDenied(
                    "You can only view your own loans".to_string(),
                ))
            }
        });
        finish(tx, result).await
    }

    /// The caller's own loans, newest first
    pub async fn member_loans(
        &self,
        caller: &CallerIdentity,
        active_only: bool,
    ) -> AppResult<Vec<Loan>> {
        let mut tx = self.database.begin().await?;
        let result = tx.member_loans(caller.principal_id(), active_only).await;
        finish(tx, result).await
    }

    /// Every loan in the library, newest first; privileged callers only
    pub async fn all_loans(&self, caller: &CallerIdentity) -> AppResult<Vec<Loan>> {
        if !caller.is_privileged() {
            tracing::warn!(
                requester_id = caller.principal_id(),
                "Non-admin attempt to list all loans"
            );
            return Err(AppError::AccessDenied(
                "Only administrators can list all loans".to_string(),
            ));
        }

        let mut tx = self.database.begin().await?;
        let result = tx.all_loans().await;
        finish(tx, result).await
    }

    pub async fn ready(&self) -> AppResult<()> {
        self.database.begin().await?.rollback().await
    }
}

/// Commit on success; on failure roll back and return the failure
async fn finish<T, X>(tx: X, result: AppResult<T>) -> AppResult<T>
where
    X: Transaction,
{
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_error) = tx.rollback().await {
                tracing::error!("Rollback failed: {}", rollback_error);
            }
            Err(error)
        }
    }
}

#[async_trait]
impl<D: Database> LoanOperations for LoansService<D> {
    async fn borrow(&self, book_id: i64, caller: &CallerIdentity) -> AppResult<Loan> {
        LoansService::borrow(self, book_id, caller).await
    }

    async fn return_loan(&self, loan_id: i64, caller: &CallerIdentity) -> AppResult<Loan> {
        LoansService::return_loan(self, loan_id, caller).await
    }

    async fn get_loan(&self, loan_id: i64, caller: &CallerIdentity) -> AppResult<Loan> {
        LoansService::get_loan(self, loan_id, caller).await
    }

    async fn member_loans(&self, caller: &CallerIdentity, active_only: bool) -> AppResult<Vec<Loan>> {
        LoansService::member_loans(self, caller, active_only).await
    }

    async fn all_loans(&self, caller: &CallerIdentity) -> AppResult<Vec<Loan>> {
        LoansService::all_loans(self, caller).await
    }

    async fn ready(&self) -> AppResult<()> {
        LoansService::ready(self).await
    }
}
