//! Core domain logic for RecipeBox.
//! This crate is the single source of truth for recipe invariants and for
//! keeping the in-memory list consistent with local storage.

pub mod config;
pub mod db;
pub mod image;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;
pub mod storage;

pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, LoggingError};
pub use model::recipe::{
    Category, Ingredient, Recipe, RecipeDraft, RecipeId, RecipeValidationError, Step,
};
pub use repo::recipe_repo::{RecipeRepository, RepoError, RepoResult, SqliteRecipeRepository};
pub use search::filter::{filter_recipes, RecipeFilter};
pub use service::migration::{migrate_from_fallback, MigrationError};
pub use service::recipe_service::{
    LoadReport, LoadSource, PersistOutcome, RecipeService, ServiceError, StorageUsage,
};
pub use storage::fallback::{FallbackError, FallbackStore};
pub use storage::kv::{FileKeyValueStore, KeyValueStore, KvError, MemoryKeyValueStore};
