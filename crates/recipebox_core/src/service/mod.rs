//! Core use-case services.
//!
//! # Responsibility
//! - Keep the in-memory recipe list and local stores in sync.
//! - Keep callers decoupled from storage details.

pub mod migration;
pub mod recipe_service;
