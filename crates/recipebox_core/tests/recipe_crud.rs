use recipebox_core::db::open_db_in_memory;
use recipebox_core::{
    Category, Recipe, RecipeDraft, RecipeRepository, RepoError, SqliteRecipeRepository,
};
use rusqlite::Connection;

fn recipe(title: &str, created_at: i64) -> Recipe {
    let draft = RecipeDraft::new(title, Category::Dinner)
        .with_ingredient("salt")
        .with_ingredient("pepper")
        .with_step("season")
        .with_step("serve")
        .normalized();
    let mut recipe = Recipe::from_draft(draft);
    recipe.created_at = created_at;
    recipe
}

#[test]
fn put_and_get_roundtrip_preserves_line_order() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteRecipeRepository::try_new(&mut conn).unwrap();

    let stew = recipe("stew", 1_000);
    repo.put_recipe(&stew).unwrap();

    let loaded = repo.get_recipe(&stew.id).unwrap().unwrap();
    assert_eq!(loaded, stew);
    assert_eq!(loaded.ingredients[0].text, "salt");
    assert_eq!(loaded.steps[1].text, "serve");
}

#[test]
fn put_replaces_existing_row() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteRecipeRepository::try_new(&mut conn).unwrap();

    let mut stew = recipe("stew", 1_000);
    repo.put_recipe(&stew).unwrap();
    stew.title = "beef stew".to_string();
    repo.put_recipe(&stew).unwrap();

    assert_eq!(repo.count_recipes().unwrap(), 1);
    let loaded = repo.get_recipe(&stew.id).unwrap().unwrap();
    assert_eq!(loaded.title, "beef stew");
}

#[test]
fn put_rejects_invalid_recipe() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteRecipeRepository::try_new(&mut conn).unwrap();

    let mut broken = recipe("broken", 1_000);
    broken.steps.clear();
    assert!(matches!(
        repo.put_recipe(&broken),
        Err(RepoError::Validation(_))
    ));
    assert_eq!(repo.count_recipes().unwrap(), 0);
}

#[test]
fn list_orders_newest_first() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteRecipeRepository::try_new(&mut conn).unwrap();

    let old = recipe("old", 1_000);
    let newest = recipe("newest", 3_000);
    let middle = recipe("middle", 2_000);
    for item in [&old, &newest, &middle] {
        repo.put_recipe(item).unwrap();
    }

    let titles: Vec<String> = repo
        .list_recipes()
        .unwrap()
        .into_iter()
        .map(|r| r.title)
        .collect();
    assert_eq!(titles, vec!["newest", "middle", "old"]);
}

#[test]
fn delete_is_idempotent() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteRecipeRepository::try_new(&mut conn).unwrap();

    let stew = recipe("stew", 1_000);
    repo.put_recipe(&stew).unwrap();
    repo.delete_recipe(&stew.id).unwrap();
    repo.delete_recipe(&stew.id).unwrap();

    assert_eq!(repo.get_recipe(&stew.id).unwrap(), None);
}

#[test]
fn replace_all_swaps_contents() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteRecipeRepository::try_new(&mut conn).unwrap();

    let stale = recipe("stale", 1_000);
    repo.put_recipe(&stale).unwrap();

    let fresh = vec![recipe("a", 2_000), recipe("b", 3_000)];
    repo.replace_all(&fresh).unwrap();

    assert_eq!(repo.count_recipes().unwrap(), 2);
    assert_eq!(repo.get_recipe(&stale.id).unwrap(), None);
}

#[test]
fn replace_all_with_invalid_entry_keeps_previous_contents() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteRecipeRepository::try_new(&mut conn).unwrap();

    let kept = recipe("kept", 1_000);
    repo.put_recipe(&kept).unwrap();

    let mut invalid = recipe("invalid", 2_000);
    invalid.title.clear();
    let err = repo
        .replace_all(&[recipe("ok", 3_000), invalid])
        .unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));

    let listed = repo.list_recipes().unwrap();
    assert_eq!(listed, vec![kept]);
}

#[test]
fn replace_all_rejects_duplicate_ids_and_keeps_previous_contents() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteRecipeRepository::try_new(&mut conn).unwrap();

    let kept = recipe("kept", 1_000);
    repo.put_recipe(&kept).unwrap();

    let first = recipe("first", 2_000);
    let mut second = recipe("second", 3_000);
    second.id = first.id.clone();
    let err = repo.replace_all(&[first.clone(), second]).unwrap_err();
    assert!(matches!(err, RepoError::DuplicateId(id) if id == first.id));

    assert_eq!(repo.list_recipes().unwrap(), vec![kept]);
}

#[test]
fn corrupted_row_is_rejected_on_read() {
    let mut conn = open_db_in_memory().unwrap();
    let stew = recipe("stew", 1_000);
    {
        let repo = SqliteRecipeRepository::try_new(&mut conn).unwrap();
        repo.put_recipe(&stew).unwrap();
    }
    conn.execute(
        "UPDATE recipes SET category = 'Brunch' WHERE id = ?1;",
        [stew.id.as_str()],
    )
    .unwrap();

    let repo = SqliteRecipeRepository::try_new(&mut conn).unwrap();
    assert!(matches!(
        repo.get_recipe(&stew.id),
        Err(RepoError::InvalidData(_))
    ));
}

#[test]
fn try_new_rejects_unmigrated_connection() {
    let mut conn = Connection::open_in_memory().unwrap();
    assert!(matches!(
        SqliteRecipeRepository::try_new(&mut conn),
        Err(RepoError::MissingRequiredTable("recipes"))
    ));
}
