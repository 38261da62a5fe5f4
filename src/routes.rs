use std::sync::Arc;

use actix_web::{web, HttpResponse};

use crate::auth::{self, Tokens};
use crate::error::AppError;
use crate::middleware::{AuthMiddleware, AuthenticatedUser};
use crate::models::{ProductInput, RecipeInput, RecipeQuery, SignInInput, SignUpInput};
use crate::repository::Repository;
use crate::{favorites, matcher, pantry, recipes};

type Repo = web::Data<dyn Repository>;

async fn sign_up(
    repo: Repo,
    tokens: web::Data<Tokens>,
    data: web::Json<SignUpInput>,
) -> Result<HttpResponse, AppError> {
    let response = auth::register(repo.get_ref(), &tokens, data.into_inner()).await?;
    Ok(HttpResponse::Created().json(response))
}

async fn sign_in(
    repo: Repo,
    tokens: web::Data<Tokens>,
    data: web::Json<SignInInput>,
) -> Result<HttpResponse, AppError> {
    let response = auth::login(repo.get_ref(), &tokens, data.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

async fn get_profile(repo: Repo, user: AuthenticatedUser) -> Result<HttpResponse, AppError> {
    let profile = auth::profile(repo.get_ref(), &user.user_id).await?;
    Ok(HttpResponse::Ok().json(profile))
}

async fn list_products(repo: Repo, user: AuthenticatedUser) -> Result<HttpResponse, AppError> {
    let products = pantry::list(repo.get_ref(), &user.user_id).await?;
    Ok(HttpResponse::Ok().json(products))
}

async fn add_product(
    repo: Repo,
    user: AuthenticatedUser,
    data: web::Json<ProductInput>,
) -> Result<HttpResponse, AppError> {
    let product = pantry::create(repo.get_ref(), &user.user_id, data.into_inner()).await?;
    Ok(HttpResponse::Created().json(product))
}

async fn update_product(
    repo: Repo,
    user: AuthenticatedUser,
    product_id: web::Path<i64>,
    data: web::Json<ProductInput>,
) -> Result<HttpResponse, AppError> {
    let product = pantry::update(
        repo.get_ref(),
        &user.user_id,
        product_id.into_inner(),
        data.into_inner(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(product))
}

async fn delete_product(
    repo: Repo,
    user: AuthenticatedUser,
    product_id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    pantry::delete(repo.get_ref(), &user.user_id, product_id.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn list_recipes(repo: Repo, query: web::Query<RecipeQuery>) -> Result<HttpResponse, AppError> {
    let recipes = recipes::list(repo.get_ref(), query.into_inner().category).await?;
    Ok(HttpResponse::Ok().json(recipes))
}

async fn add_recipe(repo: Repo, data: web::Json<RecipeInput>) -> Result<HttpResponse, AppError> {
    let recipe = recipes::create(repo.get_ref(), data.into_inner()).await?;
    Ok(HttpResponse::Created().json(recipe))
}

async fn get_recipe(repo: Repo, recipe_id: web::Path<i64>) -> Result<HttpResponse, AppError> {
    let recipe = recipes::get(repo.get_ref(), recipe_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(recipe))
}

async fn search_recipes(repo: Repo, user: AuthenticatedUser) -> Result<HttpResponse, AppError> {
    let products = pantry::list(repo.get_ref(), &user.user_id).await?;
    if products.is_empty() {
        return Ok(HttpResponse::Ok().json(Vec::<()>::new()));
    }
    let all = recipes::list(repo.get_ref(), None).await?;
    Ok(HttpResponse::Ok().json(matcher::find_matches(&products, &all)))
}

async fn add_to_favorites(
    repo: Repo,
    user: AuthenticatedUser,
    recipe_id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let recipe = favorites::add(repo.get_ref(), &user.user_id, recipe_id.into_inner()).await?;
    Ok(HttpResponse::Created().json(recipe))
}

async fn remove_from_favorites(
    repo: Repo,
    user: AuthenticatedUser,
    recipe_id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    favorites::remove(repo.get_ref(), &user.user_id, recipe_id.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn list_favorites(repo: Repo, user: AuthenticatedUser) -> Result<HttpResponse, AppError> {
    let recipes = favorites::list(repo.get_ref(), &user.user_id).await?;
    Ok(HttpResponse::Ok().json(recipes))
}

/// Registers the public and secured routes along with their shared state.
pub fn configure(cfg: &mut web::ServiceConfig, repository: Arc<dyn Repository>, tokens: Tokens) {
    cfg.app_data(web::Data::from(repository))
        .app_data(web::Data::new(tokens.clone()))
        .app_data(
            web::JsonConfig::default()
                .error_handler(|err, _| AppError::BadRequest(err.to_string()).into()),
        )
        .app_data(
            web::PathConfig::default()
                .error_handler(|err, _| AppError::BadRequest(err.to_string()).into()),
        )
        .app_data(
            web::QueryConfig::default()
                .error_handler(|err, _| AppError::BadRequest(err.to_string()).into()),
        )
        .route("/register", web::post().to(sign_up))
        .route("/login", web::post().to(sign_in))
        .service(
            web::scope("/secured")
                .wrap(AuthMiddleware::new(tokens))
                .route("/profile", web::get().to(get_profile))
                .service(
                    web::resource("/products")
                        .route(web::get().to(list_products))
                        .route(web::post().to(add_product)),
                )
                .service(
                    web::resource("/products/{product_id}")
                        .route(web::put().to(update_product))
                        .route(web::delete().to(delete_product)),
                )
                .route("/recipes/search", web::get().to(search_recipes))
                .route("/recipes/favorites", web::get().to(list_favorites))
                .service(
                    web::resource("/recipes")
                        .route(web::get().to(list_recipes))
                        .route(web::post().to(add_recipe)),
                )
                .route("/recipes/{recipe_id}", web::get().to(get_recipe))
                .service(
                    web::resource("/recipes/{recipe_id}/favorites")
                        .route(web::post().to(add_to_favorites))
                        .route(web::delete().to(remove_from_favorites)),
                ),
        );
}
