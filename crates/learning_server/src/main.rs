//! learning_server: standalone REST server recording review learning signals.
//!
//! See `config.rs` for the environment variables it reads.

use std::time::Duration;

use anyhow::Context;
use learning_postgres::PgStores;
use learning_server::config::ServerConfig;
use learning_server::router::build_router;
use learning_server::state::AppState;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; real deployments set the environment directly.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,learning_server=debug,tower_http=info".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;
    tracing::info!("Connected to database");

    if config.run_migrations {
        learning_postgres::migrate(&pool).await?;
        tracing::info!("Migrations applied");
    }

    let state = AppState::postgres(config.agent.clone(), PgStores::new(pool));
    let app = build_router(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;
    tracing::info!(
        agent_id = %config.agent.agent_id,
        agent_version = %config.agent.agent_version,
        "learning_server listening on {}",
        config.bind_addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("server error")?;
    Ok(())
}
