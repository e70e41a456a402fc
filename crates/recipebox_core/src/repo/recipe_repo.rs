//! Recipe repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide keyed put/get/delete/list APIs over the `recipes` table.
//! - Keep SQL and JSON column encoding inside the persistence boundary.
//!
//! # Invariants
//! - Write paths call `Recipe::validate()` before SQL mutations.
//! - Read paths reject invalid persisted rows instead of masking them.
//! - `replace_all` is atomic: on error the previous contents survive.
//! - `replace_all` rejects lists that repeat an id.

use crate::db::DbError;
use crate::model::recipe::{Category, Ingredient, Recipe, RecipeValidationError, Step};
use rusqlite::{params, Connection, Row, TransactionBehavior};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

const RECIPE_SELECT_SQL: &str = "SELECT
    id,
    title,
    description,
    category,
    image,
    ingredients_json,
    steps_json,
    prep_time,
    created_at
FROM recipes";

const UPSERT_SQL: &str = "INSERT OR REPLACE INTO recipes (
    id,
    title,
    description,
    category,
    image,
    ingredients_json,
    steps_json,
    prep_time,
    created_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);";

const INSERT_SQL: &str = "INSERT INTO recipes (
    id,
    title,
    description,
    category,
    image,
    ingredients_json,
    steps_json,
    prep_time,
    created_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);";

const REQUIRED_COLUMNS: [&str; 9] = [
    "id",
    "title",
    "description",
    "category",
    "image",
    "ingredients_json",
    "steps_json",
    "prep_time",
    "created_at",
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for recipe persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(RecipeValidationError),
    Db(DbError),
    /// A bulk write listed the same recipe id twice.
    DuplicateId(String),
    InvalidData(String),
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::DuplicateId(id) => write!(f, "duplicate recipe id `{id}`"),
            Self::InvalidData(message) => write!(f, "invalid persisted recipe data: {message}"),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RecipeValidationError> for RepoError {
    fn from(value: RecipeValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for the primary recipe store.
pub trait RecipeRepository {
    /// Inserts or replaces one recipe keyed by id.
    fn put_recipe(&self, recipe: &Recipe) -> RepoResult<()>;
    /// Gets one recipe by id.
    fn get_recipe(&self, id: &str) -> RepoResult<Option<Recipe>>;
    /// Lists every recipe ordered by `created_at DESC, id ASC`.
    fn list_recipes(&self) -> RepoResult<Vec<Recipe>>;
    /// Deletes one recipe. Absent ids are a no-op.
    fn delete_recipe(&self, id: &str) -> RepoResult<()>;
    /// Clears the store and inserts `recipes` in one transaction.
    /// Fails with [`RepoError::DuplicateId`] when an id repeats.
    fn replace_all(&mut self, recipes: &[Recipe]) -> RepoResult<()>;
    /// Number of stored recipes.
    fn count_recipes(&self) -> RepoResult<u64>;
}

/// SQLite-backed recipe repository.
pub struct SqliteRecipeRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteRecipeRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl RecipeRepository for SqliteRecipeRepository<'_> {
    fn put_recipe(&self, recipe: &Recipe) -> RepoResult<()> {
        recipe.validate()?;
        write_recipe(self.conn, UPSERT_SQL, recipe)
    }

    fn get_recipe(&self, id: &str) -> RepoResult<Option<Recipe>> {
        let sql = format!("{RECIPE_SELECT_SQL} WHERE id = ?1;");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_recipe_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_recipes(&self) -> RepoResult<Vec<Recipe>> {
        let sql = format!("{RECIPE_SELECT_SQL} ORDER BY created_at DESC, id ASC;");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut recipes = Vec::new();
        while let Some(row) = rows.next()? {
            recipes.push(parse_recipe_row(row)?);
        }
        Ok(recipes)
    }

    fn delete_recipe(&self, id: &str) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM recipes WHERE id = ?1;", [id])?;
        Ok(())
    }

    fn replace_all(&mut self, recipes: &[Recipe]) -> RepoResult<()> {
        let mut seen = HashSet::with_capacity(recipes.len());
        for recipe in recipes {
            recipe.validate()?;
            if !seen.insert(recipe.id.as_str()) {
                return Err(RepoError::DuplicateId(recipe.id.clone()));
            }
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM recipes;", [])?;
        for recipe in recipes {
            write_recipe(&tx, INSERT_SQL, recipe)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn count_recipes(&self) -> RepoResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM recipes;", [], |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative recipe count `{count}`")))
    }
}

fn write_recipe(conn: &Connection, sql: &str, recipe: &Recipe) -> RepoResult<()> {
    let ingredients_json = encode_json("ingredients", &recipe.ingredients)?;
    let steps_json = encode_json("steps", &recipe.steps)?;
    conn.execute(
        sql,
        params![
            recipe.id.as_str(),
            recipe.title.as_str(),
            recipe.description.as_str(),
            recipe.category.as_str(),
            recipe.image.as_str(),
            ingredients_json,
            steps_json,
            recipe.prep_time.as_str(),
            recipe.created_at,
        ],
    )?;
    Ok(())
}

fn parse_recipe_row(row: &Row<'_>) -> RepoResult<Recipe> {
    let id: String = row.get("id")?;

    let category_text: String = row.get("category")?;
    let category = category_text.parse::<Category>().map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid category `{category_text}` in recipes.category for `{id}`"
        ))
    })?;

    let ingredients_text: String = row.get("ingredients_json")?;
    let ingredients: Vec<Ingredient> = serde_json::from_str(&ingredients_text).map_err(|err| {
        RepoError::InvalidData(format!(
            "invalid recipes.ingredients_json for `{id}`: {err}"
        ))
    })?;

    let steps_text: String = row.get("steps_json")?;
    let steps: Vec<Step> = serde_json::from_str(&steps_text).map_err(|err| {
        RepoError::InvalidData(format!("invalid recipes.steps_json for `{id}`: {err}"))
    })?;

    let recipe = Recipe {
        id,
        title: row.get("title")?,
        description: row.get("description")?,
        category,
        image: row.get("image")?,
        ingredients,
        steps,
        prep_time: row.get("prep_time")?,
        created_at: row.get("created_at")?,
    };
    recipe.validate()?;
    Ok(recipe)
}

fn encode_json<T: serde::Serialize>(field: &str, value: &T) -> RepoResult<String> {
    serde_json::to_string(value)
        .map_err(|err| RepoError::InvalidData(format!("failed to encode {field}: {err}")))
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    if !table_exists(conn, "recipes")? {
        return Err(RepoError::MissingRequiredTable("recipes"));
    }
    for column in REQUIRED_COLUMNS {
        if !table_has_column(conn, "recipes", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "recipes",
                column,
            });
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
