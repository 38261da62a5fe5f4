//! Random recipe generation for filling a fresh database.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::AppError;
use crate::models::{IngredientInput, Recipe, RecipeInput};
use crate::recipes;
use crate::repository::Repository;

const SAMPLE_PRODUCTS: &[&str] = &[
    "milk", "eggs", "flour", "sugar", "butter", "salt", "tomato", "cheese", "onion", "garlic",
    "turmeric", "banana", "chicken", "pork", "bacon", "cucumber",
];
const SAMPLE_UNITS: &[&str] = &["pcs", "g", "kg", "ml", "l", "tbsp", "tsp"];
const SAMPLE_CATEGORIES: &[&str] = &["Breakfast", "Lunch", "Dinner", "Dessert", "Snack"];
const SAMPLE_DESCRIPTIONS: &[&str] = &[
    "Tasty and simple",
    "A family favourite",
    "Quick and easy to make",
    "A traditional dish",
    "A healthy choice",
];

fn pick<R: Rng>(rng: &mut R, items: &[&str]) -> Option<String> {
    items.choose(rng).map(|s| s.to_string())
}

fn random_ingredient<R: Rng>(rng: &mut R) -> IngredientInput {
    // 1.00..10.00 with two decimals
    let quantity = (rng.gen_range(1.0..10.0_f64) * 100.0).round() / 100.0;
    IngredientInput {
        product_name: pick(rng, SAMPLE_PRODUCTS).unwrap_or_default(),
        quantity,
        unit: pick(rng, SAMPLE_UNITS),
    }
}

pub fn random_recipe<R: Rng>(rng: &mut R) -> RecipeInput {
    let suffix: u32 = rng.gen();
    let count = rng.gen_range(1..=4);
    RecipeInput {
        title: format!("Recipe {suffix:08x}"),
        description: pick(rng, SAMPLE_DESCRIPTIONS),
        category: pick(rng, SAMPLE_CATEGORIES),
        ingredients: (0..count).map(|_| random_ingredient(rng)).collect(),
    }
}

/// Creates `count` random recipes through the regular validation path.
pub async fn generate_and_add(repo: &dyn Repository, count: usize) -> Result<Vec<Recipe>, AppError> {
    let mut created = Vec::with_capacity(count);
    for _ in 0..count {
        let input = random_recipe(&mut rand::thread_rng());
        created.push(recipes::create(repo, input).await?);
    }
    Ok(created)
}
