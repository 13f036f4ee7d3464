use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use beanmarket_orderservice::{
    api::{identity::HttpIdentityProvider, storage::ObjectStorage},
    app_state::AppState,
    bootstrap, config, db,
    profile_cache::ProfileCache,
    routes,
    store::PgStore,
    swagger,
};
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
use tower_http::trace::TraceLayer;

/// Migrations embedded into the binary which helps with streamlining image building process
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_tracing();
    bootstrap::init_env();

    let config = config::load()?;

    tracing::info!("Running migrations...");
    let migrations_count = db::run_migrations_blocking(MIGRATIONS, &config.database.url).await?;
    tracing::info!("Run {} new migrations successfully", migrations_count);

    tracing::info!("Bootstrapping...");
    let db_pool = db::create_pool(&config.database.url).await?;
    let store = Arc::new(PgStore::new(db_pool));

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("Failed to build the HTTP client")?;

    let state = AppState {
        orders: store.clone(),
        catalog: store.clone(),
        profiles: store,
        identity: Arc::new(HttpIdentityProvider::new(http, &config.identity)),
        storage: ObjectStorage::new(&config.storage),
        profile_cache: Arc::new(ProfileCache::new(&config.profile_cache)),
        checkout: config.checkout.clone(),
    };
    tracing::info!(
        policy = ?state.checkout.transition_policy,
        shipping_fee = state.checkout.shipping_fee,
        "Order settings loaded"
    );

    let (routes, mut openapi) = routes::routes_with_openapi(&state).split_for_parts();
    openapi.info = utoipa::openapi::InfoBuilder::new()
        .title("BeanMarket OrderService API")
        .version("1.0.0")
        .build();
    let swagger_ui = swagger::create_swagger_ui(openapi)?;

    let app = Router::new()
        .merge(routes.with_state(state))
        .merge(swagger_ui)
        .layer(TraceLayer::new_for_http());

    bootstrap::serve("OrderService", &config.server.addr, app).await
}
