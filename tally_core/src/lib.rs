#![forbid(unsafe_code)]

//! Core domain model and business logic for Tally, a daily habit tracker.
//!
//! This crate provides:
//! - Domain types (habits, daily entries)
//! - Calendar-based day normalization
//! - The entry ledger (one entry per habit per day)
//! - Streak computation
//! - Persistence (store contract, JSONL log, CSV export)

pub mod types;
pub mod error;
pub mod calendar;
pub mod config;
pub mod logging;
pub mod store;
pub mod wal;
pub mod ledger;
pub mod streak;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use calendar::Calendar;
pub use config::Config;
pub use store::{HabitStore, MemoryStore};
pub use wal::JsonlStore;
pub use ledger::EntryLedger;
pub use streak::{StreakCalculator, StreakSummary};
pub use export::entries_to_csv;
