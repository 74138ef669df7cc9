//! sessiongate - Session and token authentication service

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sessiongate::{
    api::{self, AppState},
    config::Config,
    db::{
        self,
        repositories::{SqlxIdentityRepository, SqlxSessionRepository},
    },
    services::{AuthService, TokenService},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sessiongate=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting sessiongate...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");
    if config.auth.uses_development_key() {
        tracing::warn!("Using the built-in development signing key; set auth.signing_key");
    }

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);
    match pool.version().await {
        Ok(version) => tracing::debug!("Database version: {}", version),
        Err(e) => tracing::debug!("Database version unavailable: {:#}", e),
    }

    // Run migrations
    let pending = db::migrations::pending_count(&pool).await?;
    if pending > 0 {
        tracing::info!("Applying {} pending migration(s)", pending);
    }
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Create repositories
    let identity_repo = SqlxIdentityRepository::boxed(pool.clone());
    let session_repo = SqlxSessionRepository::boxed(pool.clone());

    // Demo mode: create the demo identity if it does not exist
    #[cfg(feature = "demo")]
    {
        use sessiongate::models::Identity;
        use sessiongate::services::hash_password;

        if identity_repo.get_by_username("demo").await?.is_none() {
            tracing::info!("Demo mode: Creating default identity (demo/demo123)");
            identity_repo
                .create(&Identity::new("demo", hash_password("demo123")?))
                .await?;
        }
    }

    // Initialize services
    let tokens = Arc::new(TokenService::new(&config.auth)?);
    let auth_service = Arc::new(AuthService::new(
        identity_repo,
        session_repo,
        tokens.clone(),
    ));

    let state = AppState {
        auth_service,
        tokens,
        auth_config: Arc::new(config.auth.clone()),
    };

    // Build router
    let cors_origin = HeaderValue::from_str(&config.server.cors_origin)
        .with_context(|| format!("Invalid CORS origin: {}", config.server.cors_origin))?;
    let app = api::build_router(state, cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Database connections closed");

    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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
