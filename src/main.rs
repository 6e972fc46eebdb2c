use std::sync::Arc;

use clap::Parser;
use sea_orm_migration::MigratorTrait;
use sophia::ai::{ImageClient, StockClient, TextClient};
use sophia::config::setup_logging;
use tracing::error;

#[tokio::main(flavor = "multi_thread", worker_threads = 32)]
async fn main() {
    let cli = sophia::cli::CliOptions::parse();

    if setup_logging(cli.debug).is_err() {
        return;
    }

    if let Err(err) = sophia::daily::init() {
        error!("Daily quote pool error: {}", err);
        return;
    }

    let database_path = cli
        .database_path
        .unwrap_or_else(|| "sophia.sqlite".to_string());
    let db = match sophia::db::connect_db(&database_path).await {
        Ok(db) => db,
        Err(err) => {
            error!("Database connection error: {}", err);
            return;
        }
    };

    if let Err(err) = sophia::db::migrations::Migrator::up(&db, None).await {
        error!("Database migration error: {}", err);
        return;
    }

    if let Err(err) = sophia::web::setup_server(
        &cli.listen_address,
        cli.port,
        db,
        Arc::new(TextClient::from_env()),
        Arc::new(ImageClient::from_env()),
        Arc::new(StockClient::from_env()),
    )
    .await
    {
        error!("Application error: {}", err);
    }
}
