//! One-time migration from the fallback store into SQLite.
//!
//! # Invariants
//! - The primary store is replaced atomically or not at all.
//! - The migration flag is only set after the primary write commits.
//! - Fallback data is left in place as a backup.

use crate::model::recipe::Recipe;
use crate::repo::recipe_repo::{RecipeRepository, RepoError};
use crate::storage::fallback::{FallbackError, FallbackStore};
use crate::storage::kv::KeyValueStore;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Migration failure, tagged by the side that failed.
#[derive(Debug)]
pub enum MigrationError {
    Fallback(FallbackError),
    Repo(RepoError),
}

impl Display for MigrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fallback(err) => write!(f, "migration read/flag failed: {err}"),
            Self::Repo(err) => write!(f, "migration write failed: {err}"),
        }
    }
}

impl Error for MigrationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Fallback(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<FallbackError> for MigrationError {
    fn from(value: FallbackError) -> Self {
        Self::Fallback(value)
    }
}

impl From<RepoError> for MigrationError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Copies the fallback recipe list into `primary` and marks it migrated.
///
/// Returns the migrated recipes newest first; an empty fallback list is a
/// no-op that leaves the flag unset. A fallback list that repeats an id is
/// reported as corrupt and nothing is written.
pub fn migrate_from_fallback<R, K>(
    primary: &mut R,
    fallback: &FallbackStore<K>,
) -> Result<Vec<Recipe>, MigrationError>
where
    R: RecipeRepository,
    K: KeyValueStore,
{
    let recipes = fallback.load_recipes()?;
    if recipes.is_empty() {
        return Ok(recipes);
    }

    primary.replace_all(&recipes)?;
    fallback.mark_migrated()?;

    info!(
        "event=fallback_migrate module=service status=ok count={}",
        recipes.len()
    );
    Ok(recipes)
}
