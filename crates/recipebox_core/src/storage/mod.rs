//! Fallback persistence used when the SQLite store is unavailable.
//!
//! # Responsibility
//! - Provide localStorage-like key-value stores.
//! - Persist the recipe list as one JSON document on top of them.

pub mod fallback;
pub mod kv;
