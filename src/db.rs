use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::TryStreamExt;
use log::info;
use mongodb::bson::{doc, DateTime, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{
    ClientOptions, FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument,
    UpdateOptions,
};
use mongodb::{Client, Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};

use crate::config::DatabaseConfig;
use crate::error::AppError;
use crate::memory::MemoryRepository;
use crate::models::{Counter, Ingredient, Product, ProductDraft, Recipe, RecipeDraft, User};
use crate::repository::Repository;

/// Opens the repository named by `DATABASE_URL`.
///
/// `memory://` keeps everything in process; anything else is handed to the
/// MongoDB driver.
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn Repository>, AppError> {
    if config.is_in_memory() {
        info!("Using in-memory repository");
        return Ok(Arc::new(MemoryRepository::new()));
    }

    let client_options = ClientOptions::parse(&config.url).await?;
    let client = Client::with_options(client_options)?;
    let repository = MongoRepository::new(client.database(&config.name));
    repository.ensure_indexes().await?;

    info!("Connected to MongoDB database {}", config.name);
    Ok(Arc::new(repository))
}

#[derive(Debug, Serialize, Deserialize)]
struct UserDocument {
    #[serde(rename = "_id")]
    id: String,
    email: String,
    full_name: String,
    password_hash: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ProductDocument {
    #[serde(rename = "_id")]
    id: i64,
    owner: String,
    name: String,
    name_key: String,
    quantity: Option<f64>,
    unit: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IngredientDocument {
    product_name: String,
    quantity: f64,
    unit: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RecipeDocument {
    #[serde(rename = "_id")]
    id: i64,
    title: String,
    description: Option<String>,
    category: Option<String>,
    ingredients: Vec<IngredientDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FavoriteDocument {
    user_id: String,
    recipe_id: i64,
    created_at: DateTime,
}

impl From<UserDocument> for User {
    fn from(doc: UserDocument) -> Self {
        User {
            id: doc.id,
            email: doc.email,
            full_name: doc.full_name,
            password_hash: doc.password_hash,
        }
    }
}

impl From<ProductDocument> for Product {
    fn from(doc: ProductDocument) -> Self {
        Product {
            id: doc.id,
            owner: doc.owner,
            name: doc.name,
            quantity: doc.quantity,
            unit: doc.unit,
        }
    }
}

impl From<RecipeDocument> for Recipe {
    fn from(doc: RecipeDocument) -> Self {
        Recipe {
            id: doc.id,
            title: doc.title,
            description: doc.description,
            category: doc.category,
            ingredients: doc
                .ingredients
                .into_iter()
                .map(|i| Ingredient {
                    product_name: i.product_name,
                    quantity: i.quantity,
                    unit: i.unit,
                })
                .collect(),
        }
    }
}

const DUPLICATE_KEY: i32 = 11000;

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref e)) if e.code == DUPLICATE_KEY
    ) || matches!(*err.kind, ErrorKind::Command(ref e) if e.code == DUPLICATE_KEY)
}

pub struct MongoRepository {
    users: Collection<UserDocument>,
    products: Collection<ProductDocument>,
    recipes: Collection<RecipeDocument>,
    favorites: Collection<FavoriteDocument>,
    counters: Collection<Counter>,
}

impl MongoRepository {
    pub fn new(db: Database) -> Self {
        MongoRepository {
            users: db.collection("users"),
            products: db.collection("products"),
            recipes: db.collection("recipes"),
            favorites: db.collection("favorites"),
            counters: db.collection("counters"),
        }
    }

    async fn ensure_indexes(&self) -> Result<(), AppError> {
        let unique = || Some(IndexOptions::builder().unique(true).build());

        self.users
            .create_index(
                IndexModel::builder()
                    .keys(doc! {"email": 1})
                    .options(unique())
                    .build(),
                None,
            )
            .await?;
        self.products
            .create_index(
                IndexModel::builder()
                    .keys(doc! {"owner": 1, "name_key": 1})
                    .options(unique())
                    .build(),
                None,
            )
            .await?;
        self.recipes
            .create_index(IndexModel::builder().keys(doc! {"category": 1}).build(), None)
            .await?;
        self.favorites
            .create_index(
                IndexModel::builder()
                    .keys(doc! {"user_id": 1, "recipe_id": 1})
                    .options(unique())
                    .build(),
                None,
            )
            .await?;
        Ok(())
    }

    async fn next_id(&self, sequence: &str) -> Result<i64, AppError> {
        let filter = doc! {"_id": sequence};
        let update = doc! {"$inc": {"seq": 1_i64}};

        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        match self.counters.find_one_and_update(filter, update, options).await? {
            Some(counter) => Ok(counter.seq),
            None => Err(mongodb::error::Error::custom("Failed to generate sequence value").into()),
        }
    }

    async fn collect_recipes(&self, filter: Document) -> Result<Vec<Recipe>, AppError> {
        let options = FindOptions::builder().sort(doc! {"_id": 1}).build();
        let cursor = self.recipes.find(filter, options).await?;
        let recipes: Vec<RecipeDocument> = cursor.try_collect().await?;
        Ok(recipes.into_iter().map(Recipe::from).collect())
    }
}

#[async_trait]
impl Repository for MongoRepository {
    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let document = UserDocument {
            id: user.id.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            password_hash: user.password_hash.clone(),
        };
        match self.users.insert_one(document, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => {
                Err(AppError::Conflict("email already registered".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let user = self.users.find_one(doc! {"_id": id}, None).await?;
        Ok(user.map(User::from))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = self.users.find_one(doc! {"email": email}, None).await?;
        Ok(user.map(User::from))
    }

    async fn list_products(&self, owner: &str) -> Result<Vec<Product>, AppError> {
        let options = FindOptions::builder().sort(doc! {"_id": 1}).build();
        let cursor = self.products.find(doc! {"owner": owner}, options).await?;
        let products: Vec<ProductDocument> = cursor.try_collect().await?;
        Ok(products.into_iter().map(Product::from).collect())
    }

    async fn find_product(&self, owner: &str, id: i64) -> Result<Option<Product>, AppError> {
        let product = self
            .products
            .find_one(doc! {"_id": id, "owner": owner}, None)
            .await?;
        Ok(product.map(Product::from))
    }

    async fn find_product_by_name(
        &self,
        owner: &str,
        name_key: &str,
    ) -> Result<Option<Product>, AppError> {
        let filter = doc! {"owner": owner, "name_key": name_key};
        let product = self.products.find_one(filter, None).await?;
        Ok(product.map(Product::from))
    }

    async fn insert_product(
        &self,
        owner: &str,
        draft: &ProductDraft,
    ) -> Result<Product, AppError> {
        let document = ProductDocument {
            id: self.next_id("products").await?,
            owner: owner.to_string(),
            name: draft.name.clone(),
            name_key: draft.name_key.clone(),
            quantity: draft.quantity,
            unit: draft.unit.clone(),
        };
        match self.products.insert_one(&document, None).await {
            Ok(_) => Ok(document.into()),
            Err(e) if is_duplicate_key(&e) => Err(AppError::Conflict(format!(
                "product {} already exists",
                draft.name
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_product(
        &self,
        owner: &str,
        id: i64,
        draft: &ProductDraft,
    ) -> Result<Option<Product>, AppError> {
        let filter = doc! {"_id": id, "owner": owner};
        let update = doc! {"$set": {
            "name": &draft.name,
            "name_key": &draft.name_key,
            "quantity": draft.quantity,
            "unit": draft.unit.as_deref(),
        }};
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        match self.products.find_one_and_update(filter, update, options).await {
            Ok(product) => Ok(product.map(Product::from)),
            Err(e) if is_duplicate_key(&e) => Err(AppError::Conflict(format!(
                "product {} already exists",
                draft.name
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_product(&self, owner: &str, id: i64) -> Result<bool, AppError> {
        let filter = doc! {"_id": id, "owner": owner};
        let result = self.products.delete_one(filter, None).await?;
        Ok(result.deleted_count == 1)
    }

    async fn list_recipes(&self, category: Option<&str>) -> Result<Vec<Recipe>, AppError> {
        let filter = match category {
            Some(category) => doc! {"category": category},
            None => doc! {},
        };
        self.collect_recipes(filter).await
    }

    async fn find_recipe(&self, id: i64) -> Result<Option<Recipe>, AppError> {
        let recipe = self.recipes.find_one(doc! {"_id": id}, None).await?;
        Ok(recipe.map(Recipe::from))
    }

    async fn find_recipes(&self, ids: &[i64]) -> Result<Vec<Recipe>, AppError> {
        let mut found = self.collect_recipes(doc! {"_id": {"$in": ids.to_vec()}}).await?;
        // keep the caller's order
        let mut ordered = Vec::with_capacity(found.len());
        for id in ids {
            if let Some(pos) = found.iter().position(|r| r.id == *id) {
                ordered.push(found.swap_remove(pos));
            }
        }
        Ok(ordered)
    }

    async fn insert_recipe(&self, draft: &RecipeDraft) -> Result<Recipe, AppError> {
        let document = RecipeDocument {
            id: self.next_id("recipes").await?,
            title: draft.title.clone(),
            description: draft.description.clone(),
            category: draft.category.clone(),
            ingredients: draft
                .ingredients
                .iter()
                .map(|i| IngredientDocument {
                    product_name: i.product_name.clone(),
                    quantity: i.quantity,
                    unit: i.unit.clone(),
                })
                .collect(),
        };
        self.recipes.insert_one(&document, None).await?;
        Ok(document.into())
    }

    async fn add_favorite(&self, user_id: &str, recipe_id: i64) -> Result<(), AppError> {
        let filter = doc! {"user_id": user_id, "recipe_id": recipe_id};
        let update = doc! {"$setOnInsert": {"created_at": DateTime::now()}};
        let options = UpdateOptions::builder().upsert(true).build();

        match self.favorites.update_one(filter, update, options).await {
            Ok(_) => Ok(()),
            // a concurrent upsert won the race; the mark exists either way
            Err(e) if is_duplicate_key(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_favorite(&self, user_id: &str, recipe_id: i64) -> Result<(), AppError> {
        let filter = doc! {"user_id": user_id, "recipe_id": recipe_id};
        self.favorites.delete_one(filter, None).await?;
        Ok(())
    }

    async fn favorite_ids(&self, user_id: &str) -> Result<Vec<i64>, AppError> {
        let options = FindOptions::builder()
            .sort(doc! {"created_at": 1, "recipe_id": 1})
            .build();
        let cursor = self.favorites.find(doc! {"user_id": user_id}, options).await?;
        let marks: Vec<FavoriteDocument> = cursor.try_collect().await?;
        Ok(marks.into_iter().map(|m| m.recipe_id).collect())
    }
}
