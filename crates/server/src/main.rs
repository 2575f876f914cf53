mod auth;
mod cli;
mod handlers;
mod pagination;
mod publish;
mod selector;
mod validation;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use axum::{Extension, Router, Server};
use clap::Parser;
use common::{config::Config, logging};
use db::{Database, DatabaseConnection};
use tracing::info;

use crate::{cli::Cli, publish::Publisher};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    let config = Config::new(cli.config)?;

    logging::init(&config);

    let Some(server_config) = config.server.as_ref() else {
        return Err(anyhow::Error::msg("unable to load server config"));
    };

    info!("connecting to database");
    let database = Arc::new(Database::connect(&config.database.url).await?);
    let publisher = Arc::new(Publisher::from_config(&config).await?);

    info!(address = %server_config.address, "starting server");
    let server = Server::bind(&server_config.address);
    let config = Arc::new(config);

    server
        .serve(app_router(database, config, publisher).into_make_service())
        .await?;

    Ok(())
}

fn app_router(
    database: Arc<DatabaseConnection>,
    config: Arc<Config>,
    publisher: Arc<Publisher>,
) -> Router {
    Router::new()
        .nest("/draws", handlers::draws::routes(config))
        .nest("/r", handlers::public::routes())
        .layer(Extension(publisher))
        .with_state(database)
}
