use std::io;

use clap::Parser;
use log::info;

use recipe_master::config::DatabaseConfig;
use recipe_master::{db, seed};

/// Fill the recipe store with randomly generated recipes.
#[derive(Parser)]
struct Args {
    /// Number of recipes to create
    #[arg(short, long, default_value_t = 20)]
    count: usize,
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let database = DatabaseConfig::from_env().map_err(io::Error::other)?;
    if database.is_in_memory() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "DATABASE_URL points at an in-memory store; seeded recipes would be lost on exit",
        ));
    }
    let repository = db::connect(&database).await.map_err(io::Error::other)?;

    let created = seed::generate_and_add(repository.as_ref(), args.count)
        .await
        .map_err(io::Error::other)?;
    info!("Seeded {} recipes", created.len());
    Ok(())
}
