//! Book inventory queries

use async_trait::async_trait;

use super::{InventoryStore, PgTransaction, WriteOutcome};
use crate::{
    error::{AppError, AppResult},
    models::BookInventory,
};

fn book_not_found(book_id: i64) -> AppError {
    AppError::NotFound(format!("Book with id {} not found", book_id))
}

#[async_trait]
impl InventoryStore for PgTransaction {
    async fn read_book(&mut self, book_id: i64) -> AppResult<BookInventory> {
        sqlx::query_as::<_, BookInventory>(
            "SELECT id, total_copies, available_copies, version FROM books WHERE id = $1",
        )
        .bind(book_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| book_not_found(book_id))
    }

    async fn read_book_exclusive(&mut self, book_id: i64) -> AppResult<BookInventory> {
        sqlx::query_as::<_, BookInventory>(
            "SELECT id, total_copies, available_copies, version FROM books WHERE id = $1 FOR UPDATE",
        )
        .bind(book_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| book_not_found(book_id))
    }

    async fn write_book(
        &mut self,
        book_id: i64,
        available_copies: i32,
        expected_version: i64,
    ) -> AppResult<WriteOutcome> {
        // Blocks behind any transaction holding the row, then re-checks the version
        let version = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE books
            SET available_copies = $2, version = version + 1, updated_at = NOW()
            WHERE id = $1 AND version = $3
            RETURNING version
            "#,
        )
        .bind(book_id)
        .bind(available_copies)
        .bind(expected_version)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(match version {
            Some(version) => WriteOutcome::Written { version },
            None => WriteOutcome::VersionConflict,
        })
    }
}
