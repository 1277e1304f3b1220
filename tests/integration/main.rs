//! Integration tests over the in-memory store, plus ignored PostgreSQL ones

mod api_tests;
mod postgres_tests;
