//! Command-line front end for RecipeBox.
//!
//! # Responsibility
//! - Resolve configuration, logging and stores, then run one command.
//! - Continue on the fallback store when SQLite cannot be opened.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::warn;
use recipebox_core::db::open_db;
use recipebox_core::image::{encode_data_uri, is_data_uri, mime_for_path};
use recipebox_core::{
    init_logging, Category, CoreConfig, FallbackStore, FileKeyValueStore, Ingredient,
    KeyValueStore, PersistOutcome, RecipeDraft, RecipeFilter, RecipeRepository, RecipeService,
    SqliteRecipeRepository, Step,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "recipebox", version, about = "Manage a local recipe collection")]
struct Cli {
    /// Config file (defaults to <data dir>/recipebox/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List recipes, newest first.
    List {
        /// Case-insensitive title search.
        #[arg(long, short)]
        query: Option<String>,
        #[arg(long, short)]
        category: Option<Category>,
    },
    /// Print one recipe as JSON.
    Show { id: String },
    /// Create a recipe.
    Add(AddArgs),
    /// Replace fields of an existing recipe.
    Edit {
        id: String,
        #[command(flatten)]
        fields: EditArgs,
    },
    /// Delete a recipe.
    Delete { id: String },
    /// Show recipe count and approximate storage size.
    Usage,
    /// List available categories.
    Categories,
}

#[derive(Debug, Args)]
struct AddArgs {
    #[arg(long)]
    title: String,
    #[arg(long)]
    category: Category,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long, default_value = "")]
    prep_time: String,
    /// Image file path, URL or data URI.
    #[arg(long)]
    image: Option<String>,
    /// Ingredient line; repeat for each ingredient.
    #[arg(long = "ingredient", required = true)]
    ingredients: Vec<String>,
    /// Step text; repeat in order.
    #[arg(long = "step", required = true)]
    steps: Vec<String>,
}

#[derive(Debug, Args)]
struct EditArgs {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    category: Option<Category>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    prep_time: Option<String>,
    #[arg(long)]
    image: Option<String>,
    /// Replaces the whole ingredient list when given.
    #[arg(long = "ingredient")]
    ingredients: Vec<String>,
    /// Replaces the whole step list when given.
    #[arg(long = "step")]
    steps: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.config.as_deref() {
        Some(path) => CoreConfig::load_from(path, None)?,
        None => CoreConfig::load_default()?,
    };
    fs::create_dir_all(&config.data_dir).with_context(|| {
        format!(
            "failed to create data directory `{}`",
            config.data_dir.display()
        )
    })?;
    if let Err(err) = init_logging(&config) {
        eprintln!("warning: file logging disabled: {err}");
    }

    let mut conn = match open_db(&config.database_path) {
        Ok(conn) => Some(conn),
        Err(err) => {
            warn!(
                "event=cli_start module=cli status=fallback error_code=db_unavailable error={}",
                err
            );
            None
        }
    };
    let primary = match conn.as_mut() {
        Some(conn) => Some(SqliteRecipeRepository::try_new(conn)?),
        None => None,
    };
    let fallback = FallbackStore::new(FileKeyValueStore::open(&config.fallback_dir)?);

    let mut service =
        RecipeService::new(primary, Some(fallback)).with_image_max_kb(config.image_max_kb);
    service.load_initial();

    run(cli.command, &mut service)
}

fn run<R, K>(command: Command, service: &mut RecipeService<R, K>) -> Result<()>
where
    R: RecipeRepository,
    K: KeyValueStore,
{
    match command {
        Command::List { query, category } => {
            let filter = RecipeFilter::new(query.unwrap_or_default(), category);
            let hits = service.list(&filter);
            if hits.is_empty() {
                println!("no recipes");
            }
            for recipe in hits {
                println!(
                    "{}\t{}\t{}\t{}",
                    recipe.id, recipe.category, recipe.prep_time, recipe.title
                );
            }
        }
        Command::Show { id } => {
            let Some(recipe) = service.get_recipe(&id) else {
                bail!("recipe not found: {id}");
            };
            println!("{}", serde_json::to_string_pretty(recipe)?);
        }
        Command::Add(args) => {
            let draft = RecipeDraft {
                id: None,
                title: args.title,
                description: args.description,
                category: args.category,
                image: resolve_image(args.image.as_deref())?,
                ingredients: args.ingredients.into_iter().map(Ingredient::new).collect(),
                steps: args.steps.into_iter().map(Step::new).collect(),
                prep_time: args.prep_time,
            };
            let id = service.save_recipe(draft)?;
            report_saved("created", &id, service.last_outcome());
        }
        Command::Edit { id, fields } => {
            let Some(existing) = service.get_recipe(&id) else {
                bail!("recipe not found: {id}");
            };
            let draft = apply_edits(RecipeDraft::from_recipe(existing), fields)?;
            let id = service.save_recipe(draft)?;
            report_saved("updated", &id, service.last_outcome());
        }
        Command::Delete { id } => {
            service.delete_recipe(&id)?;
            report_saved("deleted", &id, service.last_outcome());
        }
        Command::Usage => {
            let usage = service.storage_usage()?;
            println!("recipes: {}", usage.recipes);
            println!("estimated size: {:.2} MB", usage.estimated_size_mb);
            if !service.has_primary() {
                println!("storage: fallback only (database unavailable)");
            }
        }
        Command::Categories => {
            for category in Category::ALL {
                println!("{category}");
            }
        }
    }
    Ok(())
}

fn apply_edits(mut draft: RecipeDraft, fields: EditArgs) -> Result<RecipeDraft> {
    if let Some(title) = fields.title {
        draft.title = title;
    }
    if let Some(category) = fields.category {
        draft.category = category;
    }
    if let Some(description) = fields.description {
        draft.description = description;
    }
    if let Some(prep_time) = fields.prep_time {
        draft.prep_time = prep_time;
    }
    if fields.image.is_some() {
        draft.image = resolve_image(fields.image.as_deref())?;
    }
    if !fields.ingredients.is_empty() {
        draft.ingredients = fields.ingredients.into_iter().map(Ingredient::new).collect();
    }
    if !fields.steps.is_empty() {
        draft.steps = fields.steps.into_iter().map(Step::new).collect();
    }
    Ok(draft)
}

/// Turns a file path into a data URI; URLs and data URIs pass through.
fn resolve_image(value: Option<&str>) -> Result<String> {
    let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(String::new());
    };
    if value.starts_with("http://") || value.starts_with("https://") || is_data_uri(value) {
        return Ok(value.to_string());
    }

    let path = Path::new(value);
    let mime = mime_for_path(path)?;
    let bytes =
        fs::read(path).with_context(|| format!("failed to read image `{}`", path.display()))?;
    Ok(encode_data_uri(mime, &bytes))
}

fn report_saved(action: &str, id: &str, outcome: Option<PersistOutcome>) {
    match outcome {
        Some(PersistOutcome::Fallback) => println!("{action} {id} (saved to fallback store)"),
        _ => println!("{action} {id}"),
    }
}
