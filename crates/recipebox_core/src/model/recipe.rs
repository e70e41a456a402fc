//! Recipe domain model.
//!
//! # Responsibility
//! - Define the canonical recipe record shared by every store.
//! - Provide draft normalization and validation used before any write.
//!
//! # Invariants
//! - `id` and `created_at` never change after creation.
//! - Ingredient and step lists keep their order; ids are unique per list.
//! - Wire field names (`prepTime`, `createdAt`) stay stable across stores.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable identifier of a recipe (`<epoch-ms>-<suffix>`).
pub type RecipeId = String;

/// Prep time applied when the draft leaves it empty.
pub const DEFAULT_PREP_TIME: &str = "15 min";
/// Image applied when the draft has none.
pub const PLACEHOLDER_IMAGE: &str = "https://picsum.photos/800/600?random=99";

const ID_SUFFIX_LEN: usize = 9;

/// Recipe category shown as filter chips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Breakfast,
    Lunch,
    Dinner,
    Dessert,
    Healthy,
    Drink,
}

impl Category {
    /// All categories in display order.
    pub const ALL: [Category; 6] = [
        Category::Breakfast,
        Category::Lunch,
        Category::Dinner,
        Category::Dessert,
        Category::Healthy,
        Category::Drink,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "Breakfast",
            Self::Lunch => "Lunch",
            Self::Dinner => "Dinner",
            Self::Dessert => "Dessert",
            Self::Healthy => "Healthy",
            Self::Drink => "Drink",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = RecipeValidationError;

    /// Parses a category name case-insensitively.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| RecipeValidationError::UnknownCategory(trimmed.to_string()))
    }
}

/// One ingredient line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: String,
    pub text: String,
}

/// One preparation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub text: String,
}

impl Ingredient {
    /// Creates an ingredient with a generated id.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            text: text.into(),
        }
    }
}

impl Step {
    /// Creates a step with a generated id.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            text: text.into(),
        }
    }
}

/// Canonical persisted recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: RecipeId,
    pub title: String,
    pub description: String,
    pub category: Category,
    /// Data URI or plain URL.
    pub image: String,
    pub ingredients: Vec<Ingredient>,
    pub steps: Vec<Step>,
    /// Free-form duration label, e.g. `30 min`.
    pub prep_time: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

/// Validation failures for recipe records and drafts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipeValidationError {
    EmptyId,
    BlankTitle,
    NegativeCreatedAt(i64),
    NoIngredients,
    NoSteps,
    BlankIngredient(String),
    BlankStep(String),
    DuplicateIngredientId(String),
    DuplicateStepId(String),
    UnknownCategory(String),
}

impl Display for RecipeValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "recipe id must not be empty"),
            Self::BlankTitle => write!(f, "recipe title must not be blank"),
            Self::NegativeCreatedAt(value) => {
                write!(f, "created_at must not be negative, got {value}")
            }
            Self::NoIngredients => write!(f, "recipe needs at least one ingredient"),
            Self::NoSteps => write!(f, "recipe needs at least one step"),
            Self::BlankIngredient(id) => write!(f, "ingredient `{id}` has blank text"),
            Self::BlankStep(id) => write!(f, "step `{id}` has blank text"),
            Self::DuplicateIngredientId(id) => write!(f, "duplicate ingredient id `{id}`"),
            Self::DuplicateStepId(id) => write!(f, "duplicate step id `{id}`"),
            Self::UnknownCategory(value) => write!(f, "unknown category `{value}`"),
        }
    }
}

impl Error for RecipeValidationError {}

impl Recipe {
    /// Validates record invariants.
    ///
    /// Called by repositories before writes and after reads.
    pub fn validate(&self) -> Result<(), RecipeValidationError> {
        if self.id.trim().is_empty() {
            return Err(RecipeValidationError::EmptyId);
        }
        if self.title.trim().is_empty() {
            return Err(RecipeValidationError::BlankTitle);
        }
        if self.created_at < 0 {
            return Err(RecipeValidationError::NegativeCreatedAt(self.created_at));
        }
        if self.ingredients.is_empty() {
            return Err(RecipeValidationError::NoIngredients);
        }
        if self.steps.is_empty() {
            return Err(RecipeValidationError::NoSteps);
        }

        let mut seen = HashSet::new();
        for ingredient in &self.ingredients {
            if ingredient.text.trim().is_empty() {
                return Err(RecipeValidationError::BlankIngredient(ingredient.id.clone()));
            }
            if !seen.insert(ingredient.id.as_str()) {
                return Err(RecipeValidationError::DuplicateIngredientId(
                    ingredient.id.clone(),
                ));
            }
        }

        seen.clear();
        for step in &self.steps {
            if step.text.trim().is_empty() {
                return Err(RecipeValidationError::BlankStep(step.id.clone()));
            }
            if !seen.insert(step.id.as_str()) {
                return Err(RecipeValidationError::DuplicateStepId(step.id.clone()));
            }
        }

        Ok(())
    }

    /// Builds a fresh recipe from a normalized draft.
    ///
    /// Any id carried by the draft is ignored; identity is generated here.
    pub fn from_draft(draft: RecipeDraft) -> Self {
        Self {
            id: generate_id(),
            title: draft.title,
            description: draft.description,
            category: draft.category,
            image: draft.image,
            ingredients: draft.ingredients,
            steps: draft.steps,
            prep_time: draft.prep_time,
            created_at: now_epoch_ms(),
        }
    }

    /// Returns a copy with all editable fields replaced by `draft`.
    ///
    /// `id` and `created_at` are kept from `self`.
    pub fn merged_with(&self, draft: RecipeDraft) -> Self {
        Self {
            id: self.id.clone(),
            title: draft.title,
            description: draft.description,
            category: draft.category,
            image: draft.image,
            ingredients: draft.ingredients,
            steps: draft.steps,
            prep_time: draft.prep_time,
            created_at: self.created_at,
        }
    }
}

/// Form input for create/update.
///
/// `id == None` creates a new recipe, `Some(id)` updates an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeDraft {
    #[serde(default)]
    pub id: Option<RecipeId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub prep_time: String,
}

impl RecipeDraft {
    /// Creates an empty draft for a new recipe.
    pub fn new(title: impl Into<String>, category: Category) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: String::new(),
            category,
            image: String::new(),
            ingredients: Vec::new(),
            steps: Vec::new(),
            prep_time: String::new(),
        }
    }

    /// Seeds an edit draft from a stored recipe.
    pub fn from_recipe(recipe: &Recipe) -> Self {
        Self {
            id: Some(recipe.id.clone()),
            title: recipe.title.clone(),
            description: recipe.description.clone(),
            category: recipe.category,
            image: recipe.image.clone(),
            ingredients: recipe.ingredients.clone(),
            steps: recipe.steps.clone(),
            prep_time: recipe.prep_time.clone(),
        }
    }

    pub fn with_ingredient(mut self, text: impl Into<String>) -> Self {
        self.ingredients.push(Ingredient::new(text));
        self
    }

    pub fn with_step(mut self, text: impl Into<String>) -> Self {
        self.steps.push(Step::new(text));
        self
    }

    /// Applies form submission rules.
    ///
    /// - title/prep time are trimmed
    /// - blank ingredient/step entries are dropped, missing ids generated
    /// - empty prep time and image fall back to defaults
    /// - a blank id means a new recipe
    pub fn normalized(mut self) -> Self {
        if self.id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            self.id = None;
        }
        self.title = self.title.trim().to_string();
        self.prep_time = self.prep_time.trim().to_string();
        if self.prep_time.is_empty() {
            self.prep_time = DEFAULT_PREP_TIME.to_string();
        }
        if self.image.trim().is_empty() {
            self.image = PLACEHOLDER_IMAGE.to_string();
        }

        self.ingredients.retain(|item| !item.text.trim().is_empty());
        for item in &mut self.ingredients {
            if item.id.trim().is_empty() {
                item.id = generate_id();
            }
        }
        self.steps.retain(|item| !item.text.trim().is_empty());
        for item in &mut self.steps {
            if item.id.trim().is_empty() {
                item.id = generate_id();
            }
        }
        self
    }
}

/// Generates a `<epoch-ms>-<9 alphanumerics>` identifier.
pub fn generate_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", now_epoch_ms(), &suffix[..ID_SUFFIX_LEN])
}

/// Current wall clock in epoch milliseconds (0 if the clock is before 1970).
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Sorts newest first with a stable id tie-break.
pub fn sort_newest_first(recipes: &mut [Recipe]) {
    recipes.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
