//! `souschef recipes` — list, show, or delete saved recipes.

use souschef_config::AppConfig;
use souschef_core::store::RecipeStore;

use super::{open_store, LOCAL_USER};

pub async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let store = open_store(&config).await?;

    let recipes = store.list_recipes(LOCAL_USER).await?;
    if recipes.is_empty() {
        println!("No saved recipes yet.");
        return Ok(());
    }

    println!("{:<38} {:<10} {:<14} TITLE", "ID", "DIFFICULTY", "CUISINE");
    for recipe in recipes {
        println!(
            "{:<38} {:<10} {:<14} {}",
            recipe.id,
            recipe.difficulty.as_deref().unwrap_or("-"),
            recipe.cuisine.as_deref().unwrap_or("-"),
            recipe.title,
        );
    }
    Ok(())
}

pub async fn show(id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let store = open_store(&config).await?;

    let recipe = store.get_recipe(id).await?;
    println!("{}", recipe.title);
    println!();

    let lists = souschef_recipes::RecipeArtifact::parse(&recipe.content).lists();
    if !lists.ingredients.is_empty() {
        println!("Ingredients:");
        for item in &lists.ingredients {
            println!("  - {item}");
        }
        println!();
    }
    if !lists.instructions.is_empty() {
        println!("Instructions:");
        for (i, step) in lists.instructions.iter().enumerate() {
            println!("  {}. {step}", i + 1);
        }
        println!();
    }
    if !lists.tips.is_empty() {
        println!("Tips:");
        for tip in &lists.tips {
            println!("  - {tip}");
        }
    }
    Ok(())
}

pub async fn delete(id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let store = open_store(&config).await?;

    if store.delete_recipe(id).await? {
        println!("Deleted recipe {id}");
    } else {
        println!("No recipe with id {id}");
    }
    Ok(())
}
