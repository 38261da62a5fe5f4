use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{Product, ProductDraft, Recipe, RecipeDraft, User};

/// Persistence used by the pantry, recipe, favorites and account services.
///
/// Every mutating call is a single atomic operation on the backing store.
/// Owner-scoped product calls return `None`/`false` for products the owner
/// does not have, whether or not the id exists for someone else.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Fails with [`AppError::Conflict`] when the email is already taken.
    async fn insert_user(&self, user: &User) -> Result<(), AppError>;
    async fn find_user(&self, id: &str) -> Result<Option<User>, AppError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn list_products(&self, owner: &str) -> Result<Vec<Product>, AppError>;
    async fn find_product(&self, owner: &str, id: i64) -> Result<Option<Product>, AppError>;
    async fn find_product_by_name(
        &self,
        owner: &str,
        name_key: &str,
    ) -> Result<Option<Product>, AppError>;
    /// Fails with [`AppError::Conflict`] when the owner already has the name.
    async fn insert_product(&self, owner: &str, draft: &ProductDraft)
        -> Result<Product, AppError>;
    async fn update_product(
        &self,
        owner: &str,
        id: i64,
        draft: &ProductDraft,
    ) -> Result<Option<Product>, AppError>;
    async fn delete_product(&self, owner: &str, id: i64) -> Result<bool, AppError>;

    /// Recipes ordered by id, optionally restricted to one category.
    async fn list_recipes(&self, category: Option<&str>) -> Result<Vec<Recipe>, AppError>;
    async fn find_recipe(&self, id: i64) -> Result<Option<Recipe>, AppError>;
    /// Resolves the ids that still exist; missing ids are left out.
    async fn find_recipes(&self, ids: &[i64]) -> Result<Vec<Recipe>, AppError>;
    async fn insert_recipe(&self, draft: &RecipeDraft) -> Result<Recipe, AppError>;

    /// Marks the recipe as favorite. Marking twice is a no-op.
    async fn add_favorite(&self, user_id: &str, recipe_id: i64) -> Result<(), AppError>;
    /// Clears the mark. Clearing a missing mark is a no-op.
    async fn remove_favorite(&self, user_id: &str, recipe_id: i64) -> Result<(), AppError>;
    /// Favorite recipe ids in the order they were marked.
    async fn favorite_ids(&self, user_id: &str) -> Result<Vec<i64>, AppError>;
}
