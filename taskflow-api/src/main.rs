//! # TaskFlow API Server
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/taskflow \
//! JWT_SECRET=$(openssl rand -hex 32) \
//! cargo run -p taskflow-api
//! ```
//!
//! See `taskflow_api::config` for every setting.

use std::net::SocketAddr;

use anyhow::Context;
use taskflow_api::{
    app::{build_router, spawn_rate_limit_pruner, AppState},
    config::{Config, LogFormat},
};
use taskflow_shared::db::{migrations, pool};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "taskflow_api=debug,taskflow_shared=info,tower_http=info".into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(config.logging.format);

    tracing::info!("TaskFlow API v{} starting", env!("CARGO_PKG_VERSION"));

    let db_config = pool::DatabaseConfig::new(config.database.url.clone())
        .with_max_connections(config.database.max_connections);
    let db = pool::create_pool(db_config)
        .await
        .context("Failed to connect to database")?;

    if config.database.run_migrations {
        migrations::run_migrations(&db)
            .await
            .context("Failed to run database migrations")?;
    }

    let bind_address = config.bind_address();
    let state = AppState::new(db.clone(), config);
    let pruner = spawn_rate_limit_pruner(&state);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;

    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    pruner.abort();
    pool::close_pool(db).await;
    tracing::info!("Server stopped");

    Ok(())
}
