//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the primary recipe store contract.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes enforce `Recipe::validate()` before persistence.

pub mod recipe_repo;
