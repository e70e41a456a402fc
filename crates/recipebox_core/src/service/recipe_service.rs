//! Recipe state service with optimistic writes.
//!
//! # Responsibility
//! - Own the in-memory recipe list shown to callers.
//! - Apply create/update/delete in memory first, then persist.
//! - Route writes to SQLite, or to the fallback store when SQLite is
//!   unavailable or a write to it fails.
//!
//! # Invariants
//! - The list is newest first; new recipes are prepended, updates keep their index.
//! - A failed write leaves the list exactly as it was before the call.
//! - `id` and `created_at` of an existing recipe are never changed by an update.
//! - Initial load runs once; later calls return the cached report.

use crate::image::{needs_compression, DEFAULT_MAX_IMAGE_KB};
use crate::model::recipe::{Recipe, RecipeDraft, RecipeValidationError};
use crate::repo::recipe_repo::{RecipeRepository, RepoError};
use crate::search::filter::{filter_recipes, RecipeFilter};
use crate::service::migration::migrate_from_fallback;
use crate::storage::fallback::{bytes_to_mb, FallbackError, FallbackStore};
use crate::storage::kv::KeyValueStore;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Where the initial list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Primary,
    /// Fallback data copied into the primary store during this load.
    Migrated,
    Fallback,
    Empty,
}

/// Result of [`RecipeService::load_initial`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub source: LoadSource,
    pub count: usize,
}

/// Store that accepted the most recent write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Primary,
    Fallback,
}

impl PersistOutcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
        }
    }
}

/// Approximate storage footprint of the current list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StorageUsage {
    pub recipes: usize,
    /// JSON size in MiB, rounded to two decimals.
    pub estimated_size_mb: f64,
}

/// Service error for recipe use-cases.
#[derive(Debug)]
pub enum ServiceError {
    Validation(RecipeValidationError),
    NotFound(String),
    /// Neither store is configured.
    NoStorage,
    /// Every configured store rejected the write.
    Persist {
        primary: Option<RepoError>,
        fallback: Option<FallbackError>,
    },
    Encode(serde_json::Error),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "recipe not found: {id}"),
            Self::NoStorage => write!(f, "no recipe storage is available"),
            Self::Persist { primary, fallback } => {
                write!(f, "failed to persist recipes")?;
                if let Some(err) = primary {
                    write!(f, "; primary: {err}")?;
                }
                if let Some(err) = fallback {
                    write!(f, "; fallback: {err}")?;
                }
                Ok(())
            }
            Self::Encode(err) => write!(f, "failed to encode recipes: {err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Persist {
                fallback: Some(err),
                ..
            } => Some(err),
            Self::Persist {
                primary: Some(err),
                ..
            } => Some(err),
            Self::Encode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RecipeValidationError> for ServiceError {
    fn from(value: RecipeValidationError) -> Self {
        Self::Validation(value)
    }
}

/// In-memory recipe state synchronized with local storage.
pub struct RecipeService<R: RecipeRepository, K: KeyValueStore> {
    recipes: Vec<Recipe>,
    is_loading: bool,
    load_report: Option<LoadReport>,
    last_outcome: Option<PersistOutcome>,
    image_max_kb: u64,
    primary: Option<R>,
    fallback: Option<FallbackStore<K>>,
}

impl<R: RecipeRepository, K: KeyValueStore> RecipeService<R, K> {
    /// Creates a service over the available stores.
    ///
    /// `primary == None` models an unavailable SQLite store.
    pub fn new(primary: Option<R>, fallback: Option<FallbackStore<K>>) -> Self {
        Self {
            recipes: Vec::new(),
            is_loading: true,
            load_report: None,
            last_outcome: None,
            image_max_kb: DEFAULT_MAX_IMAGE_KB,
            primary,
            fallback,
        }
    }

    /// Sets the image size above which saves log a compression warning.
    pub fn with_image_max_kb(mut self, max_kb: u64) -> Self {
        self.image_max_kb = max_kb;
        self
    }

    /// Loads the initial list once.
    ///
    /// Order of preference: SQLite, then a one-time migration of fallback
    /// data into SQLite, then the fallback store itself. Store errors are
    /// logged and fall through to the next source.
    pub fn load_initial(&mut self) -> LoadReport {
        if let Some(report) = self.load_report {
            return report;
        }

        let started_at = Instant::now();
        let (recipes, source) = load_from_stores(self.primary.as_mut(), self.fallback.as_ref());
        let report = LoadReport {
            source,
            count: recipes.len(),
        };
        self.recipes = recipes;
        self.is_loading = false;
        self.load_report = Some(report);

        info!(
            "event=recipes_load module=service status=ok source={:?} count={} duration_ms={}",
            report.source,
            report.count,
            started_at.elapsed().as_millis()
        );
        report
    }

    /// True until [`Self::load_initial`] has completed.
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Current list, newest first.
    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn get_recipe(&self, id: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|recipe| recipe.id == id)
    }

    /// Filtered view over the current list, order preserved.
    pub fn list(&self, filter: &RecipeFilter) -> Vec<&Recipe> {
        filter_recipes(&self.recipes, filter)
    }

    /// Store that accepted the last successful write.
    pub fn last_outcome(&self) -> Option<PersistOutcome> {
        self.last_outcome
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    /// Creates (`draft.id == None`) or updates a recipe and returns its id.
    ///
    /// The in-memory list changes before the write; when every store
    /// rejects the write the change is rolled back and the error returned.
    pub fn save_recipe(&mut self, draft: RecipeDraft) -> Result<String, ServiceError> {
        self.load_initial();
        let draft = draft.normalized();

        match draft.id.clone() {
            Some(id) => self.update_recipe(id, draft),
            None => self.create_recipe(draft),
        }
    }

    /// Deletes a recipe, restoring it at its old position if persistence fails.
    pub fn delete_recipe(&mut self, id: &str) -> Result<(), ServiceError> {
        self.load_initial();
        let index = self
            .position(id)
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;

        let removed = self.recipes.remove(index);
        match self.persist_delete(id) {
            Ok(outcome) => {
                self.last_outcome = Some(outcome);
                info!(
                    "event=recipe_delete module=service status=ok outcome={} recipe_id={}",
                    outcome.as_str(),
                    id
                );
                Ok(())
            }
            Err(err) => {
                self.recipes.insert(index, removed);
                warn!(
                    "event=recipe_delete module=service status=rollback recipe_id={} error={}",
                    id, err
                );
                Err(err)
            }
        }
    }

    /// Estimates storage used by the current list.
    pub fn storage_usage(&self) -> Result<StorageUsage, ServiceError> {
        let payload = serde_json::to_string(&self.recipes).map_err(ServiceError::Encode)?;
        let size_mb = bytes_to_mb(payload.len());
        Ok(StorageUsage {
            recipes: self.recipes.len(),
            estimated_size_mb: (size_mb * 100.0).round() / 100.0,
        })
    }

    fn create_recipe(&mut self, draft: RecipeDraft) -> Result<String, ServiceError> {
        let recipe = Recipe::from_draft(draft);
        recipe.validate()?;
        self.warn_if_large_image(&recipe);

        self.recipes.insert(0, recipe.clone());
        match self.persist_put(&recipe) {
            Ok(outcome) => {
                self.last_outcome = Some(outcome);
                info!(
                    "event=recipe_save module=service status=ok mode=create outcome={} recipe_id={}",
                    outcome.as_str(),
                    recipe.id
                );
                Ok(recipe.id)
            }
            Err(err) => {
                self.recipes.retain(|item| item.id != recipe.id);
                warn!(
                    "event=recipe_save module=service status=rollback mode=create recipe_id={} error={}",
                    recipe.id, err
                );
                Err(err)
            }
        }
    }

    fn update_recipe(&mut self, id: String, draft: RecipeDraft) -> Result<String, ServiceError> {
        let index = self
            .position(&id)
            .ok_or_else(|| ServiceError::NotFound(id.clone()))?;
        let updated = self.recipes[index].merged_with(draft);
        updated.validate()?;
        self.warn_if_large_image(&updated);

        let previous = std::mem::replace(&mut self.recipes[index], updated.clone());
        match self.persist_put(&updated) {
            Ok(outcome) => {
                self.last_outcome = Some(outcome);
                info!(
                    "event=recipe_save module=service status=ok mode=update outcome={} recipe_id={}",
                    outcome.as_str(),
                    id
                );
                Ok(id)
            }
            Err(err) => {
                self.recipes[index] = previous;
                warn!(
                    "event=recipe_save module=service status=rollback mode=update recipe_id={} error={}",
                    id, err
                );
                Err(err)
            }
        }
    }

    fn persist_put(&self, recipe: &Recipe) -> Result<PersistOutcome, ServiceError> {
        let primary_error = match self.primary.as_ref() {
            Some(primary) => match primary.put_recipe(recipe) {
                Ok(()) => return Ok(PersistOutcome::Primary),
                Err(err) => {
                    error!(
                        "event=recipe_put module=service status=error recipe_id={} error={}",
                        recipe.id, err
                    );
                    Some(err)
                }
            },
            None => None,
        };
        self.write_fallback(primary_error)
    }

    fn persist_delete(&self, id: &str) -> Result<PersistOutcome, ServiceError> {
        let primary_error = match self.primary.as_ref() {
            Some(primary) => match primary.delete_recipe(id) {
                Ok(()) => return Ok(PersistOutcome::Primary),
                Err(err) => {
                    error!(
                        "event=recipe_delete module=service status=error recipe_id={} error={}",
                        id, err
                    );
                    Some(err)
                }
            },
            None => None,
        };
        self.write_fallback(primary_error)
    }

    /// Rewrites the full in-memory list into the fallback store.
    fn write_fallback(
        &self,
        primary_error: Option<RepoError>,
    ) -> Result<PersistOutcome, ServiceError> {
        let Some(fallback) = self.fallback.as_ref() else {
            return Err(match primary_error {
                Some(err) => ServiceError::Persist {
                    primary: Some(err),
                    fallback: None,
                },
                None => ServiceError::NoStorage,
            });
        };

        match fallback.save_recipes(&self.recipes) {
            Ok(size) => {
                info!(
                    "event=fallback_save module=service status=fallback count={} size_bytes={}",
                    self.recipes.len(),
                    size
                );
                Ok(PersistOutcome::Fallback)
            }
            Err(err) => {
                error!(
                    "event=fallback_save module=service status=error error={}",
                    err
                );
                Err(ServiceError::Persist {
                    primary: primary_error,
                    fallback: Some(err),
                })
            }
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.recipes.iter().position(|recipe| recipe.id == id)
    }

    fn warn_if_large_image(&self, recipe: &Recipe) {
        if needs_compression(&recipe.image, self.image_max_kb) {
            warn!(
                "event=image_check module=service status=oversized recipe_id={} max_kb={}",
                recipe.id, self.image_max_kb
            );
        }
    }
}

fn load_from_stores<R, K>(
    primary: Option<&mut R>,
    fallback: Option<&FallbackStore<K>>,
) -> (Vec<Recipe>, LoadSource)
where
    R: RecipeRepository,
    K: KeyValueStore,
{
    if let Some(primary) = primary {
        match primary.list_recipes() {
            Ok(recipes) if !recipes.is_empty() => return (recipes, LoadSource::Primary),
            Ok(_) => {
                if let Some(fallback) = fallback {
                    if let Some(recipes) = try_migrate(primary, fallback) {
                        return (recipes, LoadSource::Migrated);
                    }
                }
            }
            Err(err) => {
                error!(
                    "event=recipes_load module=service status=error store=primary error={}",
                    err
                );
            }
        }
    }

    if let Some(fallback) = fallback {
        match fallback.load_recipes() {
            Ok(recipes) if !recipes.is_empty() => return (recipes, LoadSource::Fallback),
            Ok(_) => {}
            Err(err) => {
                error!(
                    "event=recipes_load module=service status=error store=fallback error={}",
                    err
                );
            }
        }
    }

    (Vec::new(), LoadSource::Empty)
}

fn try_migrate<R, K>(primary: &mut R, fallback: &FallbackStore<K>) -> Option<Vec<Recipe>>
where
    R: RecipeRepository,
    K: KeyValueStore,
{
    match fallback.is_migrated() {
        Ok(true) => return None,
        Ok(false) => {}
        Err(err) => {
            error!(
                "event=fallback_migrate module=service status=error error={}",
                err
            );
            return None;
        }
    }

    match migrate_from_fallback(primary, fallback) {
        Ok(recipes) if !recipes.is_empty() => Some(recipes),
        Ok(_) => None,
        Err(err) => {
            error!(
                "event=fallback_migrate module=service status=error error={}",
                err
            );
            None
        }
    }
}
