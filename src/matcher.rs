//! Ranks recipes by how much of their ingredient list a pantry covers.
//!
//! An ingredient counts as covered when the pantry has a product with the
//! same name, compared after trimming and lower-casing. Quantities and units
//! are not compared.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::models::{name_key, Product, Recipe, RecipeMatch};

/// Returns every recipe with at least one covered ingredient, best score
/// first, ties broken by ascending recipe id.
pub fn find_matches(pantry: &[Product], recipes: &[Recipe]) -> Vec<RecipeMatch> {
    let on_hand: HashSet<String> = pantry.iter().map(|p| name_key(&p.name)).collect();
    if on_hand.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(&Recipe, usize)> = recipes
        .iter()
        .map(|recipe| {
            let matched = recipe
                .ingredients
                .iter()
                .filter(|i| on_hand.contains(&name_key(&i.product_name)))
                .count();
            (recipe, matched)
        })
        .filter(|(_, matched)| *matched > 0)
        .collect();

    scored.sort_by(|(a, a_matched), (b, b_matched)| {
        compare_scores(*b_matched, b.ingredients.len(), *a_matched, a.ingredients.len())
            .then_with(|| a.id.cmp(&b.id))
    });

    scored
        .into_iter()
        .map(|(recipe, matched)| RecipeMatch {
            recipe: recipe.clone(),
            matched_count: matched,
            score: matched as f64 / recipe.ingredients.len() as f64,
        })
        .collect()
}

// matched_a / total_a against matched_b / total_b without going through floats
fn compare_scores(matched_a: usize, total_a: usize, matched_b: usize, total_b: usize) -> Ordering {
    (matched_a as u128 * total_b as u128).cmp(&(matched_b as u128 * total_a as u128))
}
