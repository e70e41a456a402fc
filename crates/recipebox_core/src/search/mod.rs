//! Recipe list filtering.
//!
//! # Responsibility
//! - Narrow the in-memory recipe list for display by title and category.

pub mod filter;
