//! Title search and category filtering over the in-memory list.
//!
//! # Invariants
//! - Filtering never reorders; output keeps the input order.
//! - A blank query matches every title.
//! - `category == None` means "All".

use crate::model::recipe::{Category, Recipe};

/// Display filter built from the search box and category chips.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    /// Case-insensitive title substring.
    pub query: String,
    pub category: Option<Category>,
}

impl RecipeFilter {
    pub fn new(query: impl Into<String>, category: Option<Category>) -> Self {
        Self {
            query: query.into(),
            category,
        }
    }

    /// Returns whether `recipe` passes both the title and category checks.
    pub fn matches(&self, recipe: &Recipe) -> bool {
        let category_ok = self
            .category
            .map_or(true, |category| recipe.category == category);
        category_ok && title_matches(&recipe.title, &self.query)
    }
}

/// Applies `filter` to `recipes`, preserving order.
pub fn filter_recipes<'a>(recipes: &'a [Recipe], filter: &RecipeFilter) -> Vec<&'a Recipe> {
    recipes
        .iter()
        .filter(|recipe| filter.matches(recipe))
        .collect()
}

fn title_matches(title: &str, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    needle.is_empty() || title.to_lowercase().contains(&needle)
}

#[cfg(test)]
mod tests {
    use super::{filter_recipes, RecipeFilter};
    use crate::model::recipe::{Category, Recipe, RecipeDraft};

    fn recipe(title: &str, category: Category) -> Recipe {
        Recipe::from_draft(
            RecipeDraft::new(title, category)
                .with_ingredient("x")
                .with_step("y")
                .normalized(),
        )
    }

    #[test]
    fn query_is_case_insensitive_and_trimmed() {
        let recipes = vec![
            recipe("Matcha Latte", Category::Drink),
            recipe("Avocado Toast", Category::Breakfast),
        ];
        let hits = filter_recipes(&recipes, &RecipeFilter::new("  LATTE ", None));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Matcha Latte");
    }

    #[test]
    fn category_and_query_combine_and_keep_order() {
        let recipes = vec![
            recipe("Green Smoothie", Category::Drink),
            recipe("Green Salad", Category::Healthy),
            recipe("Green Tea", Category::Drink),
        ];
        let hits = filter_recipes(
            &recipes,
            &RecipeFilter::new("green", Some(Category::Drink)),
        );
        let titles: Vec<&str> = hits.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Green Smoothie", "Green Tea"]);
    }

    #[test]
    fn default_filter_matches_everything() {
        let recipes = vec![recipe("A", Category::Lunch), recipe("B", Category::Dinner)];
        assert_eq!(filter_recipes(&recipes, &RecipeFilter::default()).len(), 2);
    }
}
