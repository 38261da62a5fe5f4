//! The user's pantry: products they currently have on hand.
//!
//! Every operation is scoped to the owner. Products belonging to someone
//! else are reported as missing.

use log::debug;

use crate::error::AppError;
use crate::models::{name_key, non_blank, Product, ProductDraft, ProductInput};
use crate::repository::Repository;

fn not_found() -> AppError {
    AppError::NotFound("product not found".into())
}

pub fn validate(input: ProductInput) -> Result<ProductDraft, AppError> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::validation("name", "must not be empty"));
    }
    if let Some(quantity) = input.quantity {
        if !quantity.is_finite() || quantity < 0.0 {
            return Err(AppError::validation("quantity", "must be zero or greater"));
        }
    }

    Ok(ProductDraft {
        name_key: name_key(&name),
        name,
        quantity: input.quantity,
        unit: non_blank(input.unit),
    })
}

pub async fn list(repo: &dyn Repository, owner: &str) -> Result<Vec<Product>, AppError> {
    repo.list_products(owner).await
}

/// Adds a product, folding it into an existing one with the same name.
pub async fn create(
    repo: &dyn Repository,
    owner: &str,
    input: ProductInput,
) -> Result<Product, AppError> {
    let draft = validate(input)?;

    let Some(existing) = repo.find_product_by_name(owner, &draft.name_key).await? else {
        return repo.insert_product(owner, &draft).await;
    };

    let quantity = match (existing.quantity, draft.quantity) {
        (Some(a), Some(b)) => Some(a + b),
        (a, b) => a.or(b),
    };
    if quantity.is_some_and(|q| !q.is_finite()) {
        return Err(AppError::validation("quantity", "combined quantity is too large"));
    }

    debug!("Merging {} into product {}", draft.name, existing.id);
    let merged = ProductDraft {
        name: existing.name.clone(),
        name_key: draft.name_key,
        quantity,
        unit: draft.unit.or(existing.unit),
    };
    repo.update_product(owner, existing.id, &merged)
        .await?
        .ok_or_else(not_found)
}

pub async fn update(
    repo: &dyn Repository,
    owner: &str,
    id: i64,
    input: ProductInput,
) -> Result<Product, AppError> {
    let draft = validate(input)?;
    if repo.find_product(owner, id).await?.is_none() {
        return Err(not_found());
    }

    if let Some(other) = repo.find_product_by_name(owner, &draft.name_key).await? {
        if other.id != id {
            return Err(AppError::Conflict(format!(
                "product {} already exists",
                other.name
            )));
        }
    }

    repo.update_product(owner, id, &draft)
        .await?
        .ok_or_else(not_found)
}

pub async fn delete(repo: &dyn Repository, owner: &str, id: i64) -> Result<(), AppError> {
    if repo.delete_product(owner, id).await? {
        Ok(())
    } else {
        Err(not_found())
    }
}
