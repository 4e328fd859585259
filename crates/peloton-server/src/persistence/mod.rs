//! Persistence layer for the statistics store.
//!
//! SQLite-backed storage for user totals, global totals and leaderboard
//! entries. The in-memory ledger stays authoritative; these tables let it
//! survive restarts.

pub mod db;
pub mod statistics;

pub use db::{init_database, Database};
