//! Whole-list recipe persistence over a key-value store.
//!
//! # Responsibility
//! - Serialize the full recipe list under one key.
//! - Track whether the list has been migrated into the primary store.
//!
//! # Invariants
//! - Every save rewrites the full list; there are no partial updates.
//! - Migration keeps the list in place as a backup and only sets a flag.
//! - Recipe ids are unique within a loaded list.
//! - A stored list that cannot be loaded is copied aside before it is
//!   overwritten.

use crate::model::recipe::{generate_id, sort_newest_first, Recipe};
use crate::storage::kv::{KeyValueStore, KvError};
use log::warn;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Key holding the JSON recipe list.
pub const RECIPES_KEY: &str = "recipebox-recipes";
/// Key holding the migration flag.
pub const MIGRATED_KEY: &str = "recipebox-recipes-migrated";
/// Key receiving an unloadable list before it is overwritten.
pub const UNREADABLE_KEY: &str = "recipebox-recipes-unreadable";
/// Payload size above which saves are logged as oversized.
pub const SOFT_LIMIT_BYTES: usize = 4 * 1024 * 1024;

pub type FallbackResult<T> = Result<T, FallbackError>;

/// Fallback store failure.
#[derive(Debug)]
pub enum FallbackError {
    Kv(KvError),
    /// Stored payload is not a JSON recipe list.
    Corrupt(String),
    Encode(serde_json::Error),
}

impl Display for FallbackError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kv(err) => write!(f, "{err}"),
            Self::Corrupt(message) => write!(f, "corrupt fallback recipe data: {message}"),
            Self::Encode(err) => write!(f, "failed to encode recipes: {err}"),
        }
    }
}

impl Error for FallbackError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Kv(err) => Some(err),
            Self::Corrupt(_) => None,
            Self::Encode(err) => Some(err),
        }
    }
}

impl From<KvError> for FallbackError {
    fn from(value: KvError) -> Self {
        Self::Kv(value)
    }
}

/// Recipe list persisted through a [`KeyValueStore`].
#[derive(Debug)]
pub struct FallbackStore<K: KeyValueStore> {
    kv: K,
}

impl<K: KeyValueStore> FallbackStore<K> {
    pub fn new(kv: K) -> Self {
        Self { kv }
    }

    /// Borrows the underlying key-value store.
    pub fn kv(&self) -> &K {
        &self.kv
    }

    /// Loads the stored list sorted newest first. Missing data yields `[]`.
    pub fn load_recipes(&self) -> FallbackResult<Vec<Recipe>> {
        match self.kv.get(RECIPES_KEY)? {
            Some(raw) => decode_recipes(&raw),
            None => Ok(Vec::new()),
        }
    }

    /// Rewrites the full list. Returns the payload size in bytes.
    ///
    /// Fails without writing when an unloadable stored list cannot be
    /// copied to [`UNREADABLE_KEY`] first.
    pub fn save_recipes(&self, recipes: &[Recipe]) -> FallbackResult<usize> {
        let payload = serde_json::to_string(recipes).map_err(FallbackError::Encode)?;
        let size = payload.len();
        if size > SOFT_LIMIT_BYTES {
            warn!(
                "event=fallback_save module=storage status=oversized size_mb={:.2} limit_mb={:.2}",
                bytes_to_mb(size),
                bytes_to_mb(SOFT_LIMIT_BYTES)
            );
        }
        self.preserve_unreadable()?;
        self.kv.set(RECIPES_KEY, &payload)?;
        Ok(size)
    }

    fn preserve_unreadable(&self) -> FallbackResult<()> {
        let Some(raw) = self.kv.get(RECIPES_KEY)? else {
            return Ok(());
        };
        let Err(err) = decode_recipes(&raw) else {
            return Ok(());
        };

        let key = match self.kv.get(UNREADABLE_KEY)? {
            None => UNREADABLE_KEY.to_string(),
            Some(existing) if existing == raw => return Ok(()),
            Some(_) => format!("{UNREADABLE_KEY}-{}", generate_id()),
        };
        self.kv.set(&key, &raw)?;
        warn!(
            "event=fallback_save module=storage status=preserved backup_key={} error={}",
            key, err
        );
        Ok(())
    }

    pub fn is_migrated(&self) -> FallbackResult<bool> {
        Ok(self.kv.get(MIGRATED_KEY)?.as_deref() == Some("true"))
    }

    pub fn mark_migrated(&self) -> FallbackResult<()> {
        self.kv.set(MIGRATED_KEY, "true")?;
        Ok(())
    }
}

fn decode_recipes(raw: &str) -> FallbackResult<Vec<Recipe>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut recipes: Vec<Recipe> =
        serde_json::from_str(raw).map_err(|err| FallbackError::Corrupt(err.to_string()))?;
    let mut seen = HashSet::with_capacity(recipes.len());
    for recipe in &recipes {
        recipe
            .validate()
            .map_err(|err| FallbackError::Corrupt(format!("recipe `{}`: {err}", recipe.id)))?;
        if !seen.insert(recipe.id.as_str()) {
            return Err(FallbackError::Corrupt(format!(
                "duplicate recipe id `{}`",
                recipe.id
            )));
        }
    }
    sort_newest_first(&mut recipes);
    Ok(recipes)
}

pub(crate) fn bytes_to_mb(bytes: usize) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}

#[cfg(test)]
mod tests {
    use super::{FallbackError, FallbackStore, RECIPES_KEY, SOFT_LIMIT_BYTES, UNREADABLE_KEY};
    use crate::model::recipe::{Category, Recipe, RecipeDraft};
    use crate::storage::kv::{KeyValueStore, MemoryKeyValueStore};

    fn recipe(title: &str, created_at: i64) -> Recipe {
        let draft = RecipeDraft::new(title, Category::Lunch)
            .with_ingredient("rice")
            .with_step("cook")
            .normalized();
        let mut recipe = Recipe::from_draft(draft);
        recipe.created_at = created_at;
        recipe
    }

    #[test]
    fn load_returns_empty_when_nothing_saved() {
        let store = FallbackStore::new(MemoryKeyValueStore::new());
        assert!(store.load_recipes().unwrap().is_empty());
        assert!(!store.is_migrated().unwrap());
    }

    #[test]
    fn load_sorts_newest_first() {
        let store = FallbackStore::new(MemoryKeyValueStore::new());
        let old = recipe("old", 1_000);
        let new = recipe("new", 2_000);
        store.save_recipes(&[old.clone(), new.clone()]).unwrap();

        let loaded = store.load_recipes().unwrap();
        assert_eq!(loaded, vec![new, old]);
    }

    #[test]
    fn corrupt_payload_is_reported() {
        let store = FallbackStore::new(MemoryKeyValueStore::new());
        store.kv().set(RECIPES_KEY, "{not json").unwrap();
        assert!(matches!(
            store.load_recipes(),
            Err(FallbackError::Corrupt(_))
        ));
    }

    #[test]
    fn migration_flag_roundtrip() {
        let store = FallbackStore::new(MemoryKeyValueStore::new());
        store.mark_migrated().unwrap();
        assert!(store.is_migrated().unwrap());
    }

    #[test]
    fn duplicate_ids_are_reported_as_corrupt() {
        let store = FallbackStore::new(MemoryKeyValueStore::new());
        let first = recipe("first", 1_000);
        let mut second = recipe("second", 2_000);
        second.id = first.id.clone();
        store.save_recipes(&[first, second]).unwrap();

        let err = store.load_recipes().unwrap_err();
        assert!(matches!(err, FallbackError::Corrupt(message) if message.contains("duplicate")));
    }

    #[test]
    fn save_copies_unloadable_list_aside_before_overwriting() {
        let store = FallbackStore::new(MemoryKeyValueStore::new());
        let mut invalid = recipe("legacy", 1_000);
        invalid.steps[0].text = " ".to_string();
        let legacy = serde_json::to_string(&[recipe("kept", 2_000), invalid]).unwrap();
        store.kv().set(RECIPES_KEY, &legacy).unwrap();

        let fresh = recipe("fresh", 3_000);
        store.save_recipes(std::slice::from_ref(&fresh)).unwrap();
        store.save_recipes(std::slice::from_ref(&fresh)).unwrap();

        assert_eq!(store.kv().get(UNREADABLE_KEY).unwrap(), Some(legacy));
        assert_eq!(store.load_recipes().unwrap(), vec![fresh]);
    }

    #[test]
    fn save_is_refused_when_unloadable_list_cannot_be_copied() {
        let legacy = "{not json";
        let store = FallbackStore::new(MemoryKeyValueStore::with_quota(
            RECIPES_KEY.len() + legacy.len() + 8,
        ));
        store.kv().set(RECIPES_KEY, legacy).unwrap();

        assert!(matches!(
            store.save_recipes(&[recipe("fresh", 1)]),
            Err(FallbackError::Kv(_))
        ));
        assert_eq!(store.kv().get(RECIPES_KEY).unwrap().as_deref(), Some(legacy));
    }

    #[test]
    fn oversized_payload_is_still_saved() {
        let store = FallbackStore::new(MemoryKeyValueStore::new());
        let mut big = recipe("big", 1);
        big.description = "x".repeat(SOFT_LIMIT_BYTES);

        let size = store.save_recipes(std::slice::from_ref(&big)).unwrap();
        assert!(size > SOFT_LIMIT_BYTES);
        assert_eq!(store.load_recipes().unwrap(), vec![big]);
    }
}
