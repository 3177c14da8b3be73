//! # Repository Module
//!
//! Typed views over the key-value store.
//!
//! ## Available Repositories
//!
//! - [`HistoryRepository`](history::HistoryRepository) - Scan history and favorites

pub mod history;
