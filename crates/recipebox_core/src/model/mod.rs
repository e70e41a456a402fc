//! Recipe domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep one record shape across the SQLite store and the fallback store.
//!
//! # Invariants
//! - Every recipe is identified by a stable, immutable `RecipeId`.
//! - Deletion removes the record; there are no tombstones.

pub mod recipe;
