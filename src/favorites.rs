use log::debug;

use crate::error::AppError;
use crate::models::Recipe;
use crate::repository::Repository;

/// Marks a recipe as favorite. Already-favorite recipes stay favorite.
pub async fn add(repo: &dyn Repository, user_id: &str, recipe_id: i64) -> Result<Recipe, AppError> {
    if repo.find_user(user_id).await?.is_none() {
        return Err(AppError::NotFound("user not found".into()));
    }
    let recipe = repo
        .find_recipe(recipe_id)
        .await?
        .ok_or_else(|| AppError::NotFound("recipe not found".into()))?;

    repo.add_favorite(user_id, recipe_id).await?;
    Ok(recipe)
}

/// Clears the mark. Succeeds when there was nothing to clear.
pub async fn remove(repo: &dyn Repository, user_id: &str, recipe_id: i64) -> Result<(), AppError> {
    repo.remove_favorite(user_id, recipe_id).await
}

/// Favorite recipes in the order they were marked. Marks pointing at
/// recipes that no longer exist are skipped.
pub async fn list(repo: &dyn Repository, user_id: &str) -> Result<Vec<Recipe>, AppError> {
    let ids = repo.favorite_ids(user_id).await?;
    let recipes = repo.find_recipes(&ids).await?;
    if recipes.len() < ids.len() {
        debug!(
            "Skipped {} dangling favorites for user {user_id}",
            ids.len() - recipes.len()
        );
    }
    Ok(recipes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRepository;
    use crate::models::{Ingredient, RecipeDraft, User};

    async fn seeded() -> (MemoryRepository, Vec<i64>) {
        let repo = MemoryRepository::new();
        repo.insert_user(&User {
            id: "u1".into(),
            email: "u1@example.com".into(),
            full_name: String::new(),
            password_hash: String::new(),
        })
        .await
        .unwrap();

        let mut ids = Vec::new();
        for title in ["Pancakes", "Soup", "Salad", "Pie", "Stew"] {
            let recipe = repo
                .insert_recipe(&RecipeDraft {
                    title: title.into(),
                    description: None,
                    category: None,
                    ingredients: vec![Ingredient {
                        product_name: "Egg".into(),
                        quantity: 1.0,
                        unit: None,
                    }],
                })
                .await
                .unwrap();
            ids.push(recipe.id);
        }
        (repo, ids)
    }

    #[actix_web::test]
    async fn adding_twice_lists_once() {
        let (repo, ids) = seeded().await;
        let five = ids[4];

        add(&repo, "u1", five).await.unwrap();
        add(&repo, "u1", five).await.unwrap();

        let favorites = list(&repo, "u1").await.unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].id, five);
    }

    #[actix_web::test]
    async fn removing_twice_is_fine() {
        let (repo, ids) = seeded().await;
        add(&repo, "u1", ids[0]).await.unwrap();

        remove(&repo, "u1", ids[0]).await.unwrap();
        remove(&repo, "u1", ids[0]).await.unwrap();
        remove(&repo, "u1", 999).await.unwrap();
        assert!(list(&repo, "u1").await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn list_returns_exactly_the_added_recipes() {
        let (repo, ids) = seeded().await;
        for id in [ids[2], ids[0], ids[2], ids[3], ids[0]] {
            add(&repo, "u1", id).await.unwrap();
        }

        let listed: Vec<i64> = list(&repo, "u1").await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(listed, [ids[2], ids[0], ids[3]]);
    }

    #[actix_web::test]
    async fn unknown_recipe_or_user_is_not_found() {
        let (repo, ids) = seeded().await;

        let err = add(&repo, "u1", 999).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = add(&repo, "ghost", ids[0]).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(list(&repo, "ghost").await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn dangling_marks_are_skipped() {
        let (repo, ids) = seeded().await;
        add(&repo, "u1", ids[1]).await.unwrap();
        repo.add_favorite("u1", 404).await.unwrap();

        let favorites = list(&repo, "u1").await.unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].id, ids[1]);
    }
}
