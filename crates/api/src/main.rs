use std::sync::Arc;

use gatekeeper_api::app::build_app;
use gatekeeper_api::config::Config;
use gatekeeper_api::notifier::LogNotifier;
use gatekeeper_engine::{AccessEngine, EngineConfig};
use gatekeeper_store::{PgAccessStore, PgBanStore, PgSuggestionStore, SharedPool, schema};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gatekeeper_observability::init();

    let config = Config::from_env()?;

    // The process still serves if the store is down; the engine stays in
    // fail-soft mode until the pool connects.
    let pool = SharedPool::new();
    if let Some(url) = &config.database_url {
        match pool.connect(url).await {
            Ok(()) => {
                if let Err(err) = schema::ensure_schema(&pool).await {
                    tracing::warn!(error = %err, "schema bootstrap failed");
                }
            }
            Err(err) => tracing::error!(error = %err, "database connection failed"),
        }
    }

    let mut engine_config = EngineConfig::new(config.admin);
    engine_config.cache_ttl = config.cache_ttl;
    engine_config.cache_capacity = config.cache_capacity;

    let engine = Arc::new(AccessEngine::new(
        Arc::new(PgAccessStore::new(pool.clone())),
        Arc::new(PgBanStore::new(pool.clone())),
        Arc::new(PgSuggestionStore::new(pool)),
        Arc::new(LogNotifier),
        engine_config,
    ));
    engine.warm_from_store().await;

    let app = build_app(engine);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
