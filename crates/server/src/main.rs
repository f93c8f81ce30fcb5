mod auth;
mod handlers;
mod token;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use axum::{routing::get, Json, Router, Server};
use chain::ChainClient;
use common::{config::Config, logging};
use db::{lock::RunLock, Database, DatabaseConnection, Duration};
use discord::DiscordGate;
use migration::MigratorTrait;
use prices::{CoinGecko, PriceCache};
use serde_json::{json, Value};
use tracing::info;
use worker::{JobQueue, Worker};

/// Shared state handed to every route.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) db: Arc<DatabaseConnection>,
    pub(crate) config: Arc<Config>,
    pub(crate) queue: JobQueue,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::new()?;

    logging::init(&config);

    let Some(server_config) = config.server.as_ref() else {
        return Err(anyhow::Error::msg("unable to load server config"));
    };
    let address = server_config.address;

    info!("connecting to database");
    let database = Arc::new(Database::connect(&config.database.url).await?);

    if config.database.auto_migrate {
        info!("running pending migrations");
        migration::Migrator::up(database.as_ref(), None).await?;
    }

    let chat = Arc::new(DiscordGate::new(&config.discord.bot_token));
    let holdings = Arc::new(ChainClient::new(&config.chain));
    let price_cache = Arc::new(PriceCache::new(
        (*database).clone(),
        CoinGecko::new(&config.price),
        Duration::seconds(config.price.ttl_seconds as i64),
    ));

    let worker = Worker::new(
        (*database).clone(),
        chat,
        holdings,
        price_cache,
        &config.worker,
    );

    let queue = worker.spawn_queue();

    // The run lock lives on its own connection so that process death
    // releases it through session teardown.
    let lock = RunLock::connect(&config.database.url).await?;
    worker.spawn_scheduler(lock, &config.worker.cron)?;
    worker.spawn_cleanup();

    let server = Server::bind(&address);
    let config = Arc::new(config);

    server
        .serve(app_router(database, config, queue).into_make_service())
        .await?;

    Ok(())
}

fn app_router(database: Arc<DatabaseConnection>, config: Arc<Config>, queue: JobQueue) -> Router {
    let state = AppState {
        db: database,
        config,
        queue,
    };

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/verify", handlers::verify::routes(state.clone()))
        .nest("/internal", handlers::internal::routes(state))
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
