use log::debug;

use crate::error::AppError;
use crate::models::{non_blank, Ingredient, Recipe, RecipeDraft, RecipeInput};
use crate::repository::Repository;

/// Normalizes a recipe submission.
///
/// Ingredient rows without a name or with a non-positive quantity are
/// dropped; at least one valid row has to remain.
pub fn validate(input: RecipeInput) -> Result<RecipeDraft, AppError> {
    let title = input.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::validation("title", "must not be empty"));
    }

    let submitted = input.ingredients.len();
    let ingredients: Vec<Ingredient> = input
        .ingredients
        .into_iter()
        .filter_map(|row| {
            let product_name = row.product_name.trim().to_string();
            if product_name.is_empty() || !row.quantity.is_finite() || row.quantity <= 0.0 {
                return None;
            }
            Some(Ingredient {
                product_name,
                quantity: row.quantity,
                unit: non_blank(row.unit),
            })
        })
        .collect();

    if ingredients.is_empty() {
        return Err(AppError::validation(
            "ingredients",
            "at least one ingredient with a name and a positive quantity is required",
        ));
    }
    if ingredients.len() < submitted {
        debug!(
            "Dropped {} invalid ingredient rows from {title}",
            submitted - ingredients.len()
        );
    }

    Ok(RecipeDraft {
        title,
        description: non_blank(input.description),
        category: non_blank(input.category),
        ingredients,
    })
}

pub async fn list(repo: &dyn Repository, category: Option<String>) -> Result<Vec<Recipe>, AppError> {
    let category = non_blank(category);
    repo.list_recipes(category.as_deref()).await
}

pub async fn create(repo: &dyn Repository, input: RecipeInput) -> Result<Recipe, AppError> {
    let draft = validate(input)?;
    repo.insert_recipe(&draft).await
}

pub async fn get(repo: &dyn Repository, id: i64) -> Result<Recipe, AppError> {
    repo.find_recipe(id)
        .await?
        .ok_or_else(|| AppError::NotFound("recipe not found".into()))
}
