use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use carriertrust_server::config::Config;
use carriertrust_server::http_client::create_backend_client;
use carriertrust_server::identity::{
    IdentityProvider, RemoteIdentityProvider, StaticIdentityProvider,
};
use carriertrust_server::notifier::{HttpNotifier, LogNotifier, Notifier};
use carriertrust_server::store::{RecordStore, SqliteRepository};
use carriertrust_server::{get_version, http, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("Starting CarrierTrust {}", get_version());

    let config = Config::from_env().context("Failed to load configuration")?;

    let db_path = config.database_path();
    info!("Using database: {}", db_path.display());
    let store: Arc<dyn RecordStore> = Arc::new(
        SqliteRepository::new(&db_path).context("Failed to initialize SQLite database")?,
    );

    for admin in &config.admin_user_ids {
        store
            .set_admin(admin, true)
            .await
            .with_context(|| format!("Failed to grant admin to {}", admin))?;
        info!("Granted admin capability to {}", admin);
    }

    let client = create_backend_client()?;

    let notifier: Arc<dyn Notifier> = match (&config.functions_url, &config.functions_key) {
        (Some(url), Some(key)) => {
            info!("Sending notifications via {}", url);
            Arc::new(HttpNotifier::new(client.clone(), url, key.clone()))
        }
        _ => {
            warn!("FUNCTIONS_URL not set; notifications will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let identity: Arc<dyn IdentityProvider> = match (&config.auth_url, &config.backend_api_key) {
        (Some(url), Some(key)) => {
            info!("Verifying sessions against {}", url);
            Arc::new(RemoteIdentityProvider::new(client, url, key.clone()))
        }
        _ => {
            let tokens = StaticIdentityProvider::parse(
                config.static_tokens.as_deref().unwrap_or_default(),
            )
            .context("STATIC_TOKENS is malformed")?;
            warn!(
                "Using {} static development token(s) for authentication",
                tokens.len()
            );
            Arc::new(tokens)
        }
    };

    let state = Arc::new(AppState::new(store, notifier, identity));
    let app = http::router(state).layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    info!("Server listening on port {}", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
