use std::io;

use actix_web::middleware::Logger;
use actix_web::{App, HttpServer};
use log::info;

use recipe_master::auth::Tokens;
use recipe_master::config::Config;
use recipe_master::middleware::Cors;
use recipe_master::{db, routes};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok(); // Load environment variables from .env file
    env_logger::init();

    let config = Config::from_env().map_err(io::Error::other)?;
    let repository = db::connect(&config.database).await.map_err(io::Error::other)?;
    let tokens = Tokens::new(config.jwt_secret.clone(), config.jwt_lifetime);
    let allowed_origin = config.allowed_origin.clone();

    info!("Listening on {}", config.bind_address);

    HttpServer::new(move || {
        let repository = repository.clone();
        let tokens = tokens.clone();
        App::new()
            .wrap(Logger::default())
            .wrap(Cors::new(allowed_origin.clone()))
            .configure(move |cfg| routes::configure(cfg, repository, tokens))
    })
    .bind(&config.bind_address)?
    .run()
    .await
}
