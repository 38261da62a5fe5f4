use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::models::{name_key, Product, ProductDraft, Recipe, RecipeDraft, User};
use crate::repository::Repository;

#[derive(Default)]
struct State {
    users: BTreeMap<String, User>,
    products: BTreeMap<i64, Product>,
    recipes: BTreeMap<i64, Recipe>,
    // (user id, recipe id) in the order they were marked
    favorites: Vec<(String, i64)>,
    next_product_id: i64,
    next_recipe_id: i64,
}

/// Repository kept in process memory, selected with a `memory://` URL.
#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn owns_name(product: &Product, owner: &str, key: &str) -> bool {
    product.owner == owner && name_key(&product.name) == key
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("email already registered".into()));
        }
        state.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>, AppError> {
        Ok(self.state.read().await.users.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_products(&self, owner: &str) -> Result<Vec<Product>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .products
            .values()
            .filter(|p| p.owner == owner)
            .cloned()
            .collect())
    }

    async fn find_product(&self, owner: &str, id: i64) -> Result<Option<Product>, AppError> {
        let state = self.state.read().await;
        Ok(state.products.get(&id).filter(|p| p.owner == owner).cloned())
    }

    async fn find_product_by_name(
        &self,
        owner: &str,
        name_key: &str,
    ) -> Result<Option<Product>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .products
            .values()
            .find(|p| owns_name(p, owner, name_key))
            .cloned())
    }

    async fn insert_product(
        &self,
        owner: &str,
        draft: &ProductDraft,
    ) -> Result<Product, AppError> {
        let mut state = self.state.write().await;
        if state
            .products
            .values()
            .any(|p| owns_name(p, owner, &draft.name_key))
        {
            return Err(AppError::Conflict(format!(
                "product {} already exists",
                draft.name
            )));
        }

        state.next_product_id += 1;
        let product = Product {
            id: state.next_product_id,
            owner: owner.to_string(),
            name: draft.name.clone(),
            quantity: draft.quantity,
            unit: draft.unit.clone(),
        };
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        owner: &str,
        id: i64,
        draft: &ProductDraft,
    ) -> Result<Option<Product>, AppError> {
        let mut state = self.state.write().await;
        let clash = state
            .products
            .values()
            .any(|p| p.id != id && owns_name(p, owner, &draft.name_key));

        match state.products.get_mut(&id) {
            Some(product) if product.owner == owner => {
                if clash {
                    return Err(AppError::Conflict(format!(
                        "product {} already exists",
                        draft.name
                    )));
                }
                product.name = draft.name.clone();
                product.quantity = draft.quantity;
                product.unit = draft.unit.clone();
                Ok(Some(product.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_product(&self, owner: &str, id: i64) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        match state.products.get(&id) {
            Some(product) if product.owner == owner => {
                state.products.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_recipes(&self, category: Option<&str>) -> Result<Vec<Recipe>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .recipes
            .values()
            .filter(|r| category.map_or(true, |c| r.category.as_deref() == Some(c)))
            .cloned()
            .collect())
    }

    async fn find_recipe(&self, id: i64) -> Result<Option<Recipe>, AppError> {
        Ok(self.state.read().await.recipes.get(&id).cloned())
    }

    async fn find_recipes(&self, ids: &[i64]) -> Result<Vec<Recipe>, AppError> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.recipes.get(id).cloned())
            .collect())
    }

    async fn insert_recipe(&self, draft: &RecipeDraft) -> Result<Recipe, AppError> {
        let mut state = self.state.write().await;
        state.next_recipe_id += 1;
        let recipe = Recipe {
            id: state.next_recipe_id,
            title: draft.title.clone(),
            description: draft.description.clone(),
            category: draft.category.clone(),
            ingredients: draft.ingredients.clone(),
        };
        state.recipes.insert(recipe.id, recipe.clone());
        Ok(recipe)
    }

    async fn add_favorite(&self, user_id: &str, recipe_id: i64) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        let marked = state
            .favorites
            .iter()
            .any(|(user, recipe)| user == user_id && *recipe == recipe_id);
        if !marked {
            state.favorites.push((user_id.to_string(), recipe_id));
        }
        Ok(())
    }

    async fn remove_favorite(&self, user_id: &str, recipe_id: i64) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        state
            .favorites
            .retain(|(user, recipe)| !(user == user_id && *recipe == recipe_id));
        Ok(())
    }

    async fn favorite_ids(&self, user_id: &str) -> Result<Vec<i64>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .favorites
            .iter()
            .filter(|(user, _)| user == user_id)
            .map(|(_, recipe)| *recipe)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str) -> ProductDraft {
        ProductDraft {
            name: name.to_string(),
            name_key: name_key(name),
            quantity: Some(1.0),
            unit: None,
        }
    }

    #[actix_web::test]
    async fn products_are_scoped_to_their_owner() {
        let repo = MemoryRepository::new();
        let egg = repo.insert_product("alice", &draft("Egg")).await.unwrap();
        repo.insert_product("bob", &draft("Egg")).await.unwrap();

        assert_eq!(repo.list_products("alice").await.unwrap(), vec![egg.clone()]);
        assert!(repo.update_product("bob", egg.id, &draft("Milk")).await.unwrap().is_none());
        assert!(!repo.delete_product("bob", egg.id).await.unwrap());
        assert!(repo.delete_product("alice", egg.id).await.unwrap());
    }

    #[actix_web::test]
    async fn duplicate_product_name_conflicts() {
        let repo = MemoryRepository::new();
        repo.insert_product("alice", &draft("Egg")).await.unwrap();
        let err = repo.insert_product("alice", &draft("egg")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[actix_web::test]
    async fn favorites_keep_mark_order_and_collapse_duplicates() {
        let repo = MemoryRepository::new();
        repo.add_favorite("alice", 3).await.unwrap();
        repo.add_favorite("alice", 1).await.unwrap();
        repo.add_favorite("alice", 3).await.unwrap();
        repo.add_favorite("bob", 2).await.unwrap();

        assert_eq!(repo.favorite_ids("alice").await.unwrap(), vec![3, 1]);

        repo.remove_favorite("alice", 3).await.unwrap();
        repo.remove_favorite("alice", 3).await.unwrap();
        assert_eq!(repo.favorite_ids("alice").await.unwrap(), vec![1]);
        assert_eq!(repo.favorite_ids("bob").await.unwrap(), vec![2]);
    }
}
