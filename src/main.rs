// src/main.rs

use std::{error::Error, sync::Arc, time::Duration};

use examhall::{
    config::Config,
    engine::Engine,
    routes,
    scorer::{HttpScorer, Scorer},
    state::AppState,
    store::{ExamStore, MemoryStore, PgStore},
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load configuration from environment (and .env, if present)
    let config = Config::from_env()?;

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let store = open_store(&config).await?;

    let scorer: Option<Arc<dyn Scorer>> = match &config.scorer_url {
        Some(url) => {
            tracing::info!("External scorer enabled at {}", url);
            Some(Arc::new(HttpScorer::new(url.clone(), config.scorer_timeout)?))
        }
        None => None,
    };

    let state = AppState {
        engine: Engine::new(store, scorer, config.store_timeout),
        config: config.clone(),
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Connects to Postgres (with retry) and applies migrations, or falls back
/// to the in-memory store when no DATABASE_URL is configured.
async fn open_store(config: &Config) -> Result<Arc<dyn ExamStore>, Box<dyn Error>> {
    let Some(database_url) = &config.database_url else {
        tracing::warn!("DATABASE_URL not set; using the in-memory store, data will not persist");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    return Err(
                        format!("Failed to connect to database after 5 retries: {}", e).into(),
                    );
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };
    tracing::info!("Database connected...");

    let store = PgStore::new(pool);
    tracing::info!("Running migrations...");
    store.migrate().await?;
    tracing::info!("Migrations applied successfully.");

    Ok(Arc::new(store))
}
