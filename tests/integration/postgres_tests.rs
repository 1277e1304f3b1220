//! PostgreSQL store tests
//!
//! Need a reachable database in `DATABASE_URL`.
//! Run with: cargo test -- --ignored

use std::time::Duration;

use chrono::Utc;
use sqlx::{postgres::PgPoolOptions, PgPool};

use booklender_server::{
    error::AppError,
    models::{CallerIdentity, NewLoan},
    repository::{Database, InventoryStore, LoanStore, PgDatabase, Transaction, WriteOutcome},
    services::LoansService,
};

use crate::common::lending_config;

async fn database() -> PgDatabase {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    PgDatabase::new(pool)
}

/// Insert a fresh member and a book, returning their ids
async fn seed(pool: &PgPool, total: i32, available: i32) -> (i64, i64) {
    let tag = Utc::now().timestamp_nanos_opt().unwrap_or_default();

    let member_id: i64 =
        sqlx::query_scalar("INSERT INTO members (name, email) VALUES ($1, $2) RETURNING id")
            .bind("Test Member")
            .bind(format!("member-{}@example.com", tag))
            .fetch_one(pool)
            .await
            .unwrap();

    let book_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO books (title, author, isbn, total_copies, available_copies)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind("Test Book")
    .bind("Test Author")
    .bind(format!("isbn-{}", tag))
    .bind(total)
    .bind(available)
    .fetch_one(pool)
    .await
    .unwrap();

    (member_id, book_id)
}

#[tokio::test]
#[ignore]
async fn test_pg_version_checked_write() {
    let db = database().await;
    let (_, book_id) = seed(&db.pool, 3, 3).await;

    let mut tx = db.begin().await.unwrap();
    let book = tx.read_book(book_id).await.unwrap();
    assert_eq!(
        tx.write_book(book_id, 2, book.version).await.unwrap(),
        WriteOutcome::Written { version: book.version + 1 }
    );
    assert_eq!(
        tx.write_book(book_id, 1, book.version).await.unwrap(),
        WriteOutcome::VersionConflict
    );
    tx.commit().await.unwrap();

    let mut check = db.begin().await.unwrap();
    let stored = check.read_book(book_id).await.unwrap();
    assert_eq!(stored.available_copies, 2);
    assert_eq!(stored.version, book.version + 1);
}

#[tokio::test]
#[ignore]
async fn test_pg_counter_outside_bounds_is_rejected() {
    let db = database().await;
    let (_, book_id) = seed(&db.pool, 1, 1).await;

    let mut tx = db.begin().await.unwrap();
    let book = tx.read_book(book_id).await.unwrap();
    let result = tx.write_book(book_id, 2, book.version).await;
    assert!(matches!(result, Err(AppError::Database(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore]
async fn test_pg_exclusive_read_waits_for_holder() {
    let db = database().await;
    let (_, book_id) = seed(&db.pool, 2, 2).await;

    let mut holder = db.begin().await.unwrap();
    let book = holder.read_book_exclusive(book_id).await.unwrap();

    let contender_db = db.clone();
    let contender = tokio::spawn(async move {
        let mut tx = contender_db.begin().await.unwrap();
        tx.read_book_exclusive(book_id).await.unwrap()
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!contender.is_finished());

    holder.write_book(book_id, 1, book.version).await.unwrap();
    holder.commit().await.unwrap();

    let seen = contender.await.unwrap();
    assert_eq!(seen.available_copies, 1);
    assert_eq!(seen.version, book.version + 1);
}

#[tokio::test]
#[ignore]
async fn test_pg_mark_returned_only_once() {
    let db = database().await;
    let (member_id, book_id) = seed(&db.pool, 1, 1).await;
    let now = Utc::now();

    let mut tx = db.begin().await.unwrap();
    let loan = tx
        .create_loan(NewLoan {
            book_id,
            member_id,
            borrowed_at: now,
            due_at: now + chrono::Duration::days(14),
        })
        .await
        .unwrap();

    let held = tx.read_loan_exclusive(loan.id).await.unwrap();
    assert!(held.is_active());
    assert!(tx.mark_returned(loan.id, now).await.unwrap().is_some());
    assert!(tx.mark_returned(loan.id, now).await.unwrap().is_none());
    tx.commit().await.unwrap();

    let mut check = db.begin().await.unwrap();
    assert!(!check.read_loan(loan.id).await.unwrap().is_active());
    assert_eq!(check.count_loans(member_id, true).await.unwrap(), 0);
}

#[tokio::test]
#[ignore]
async fn test_pg_borrow_and_return() {
    let db = database().await;
    let (member_id, book_id) = seed(&db.pool, 2, 2).await;
    let service = LoansService::new(db.clone(), &lending_config());
    let caller = CallerIdentity::member(member_id);

    let loan = service.borrow(book_id, &caller).await.unwrap();
    assert_eq!(service.member_loans(&caller, true).await.unwrap(), vec![loan.clone()]);

    service.return_loan(loan.id, &caller).await.unwrap();
    assert!(matches!(
        service.return_loan(loan.id, &caller).await,
        Err(AppError::AlreadyReturned { .. })
    ));

    let mut check = db.begin().await.unwrap();
    assert_eq!(check.read_book(book_id).await.unwrap().available_copies, 2);
}
