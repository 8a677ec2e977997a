use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use syncqueue::config::Config;
use syncqueue::connectivity::{self, Connectivity};
use syncqueue::store::{QueueStore, SqliteStore};
use syncqueue::transport::HttpTransport;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Load config
    let config = Config::from_env().expect("Failed to load configuration");

    // Init tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(&config.log_level)
        }))
        .init();

    tracing::info!("Starting syncqueue");

    // Open the queue database (runs migrations)
    let store = SqliteStore::connect(&config.database_url)
        .await
        .expect("Failed to open queue database");

    // No drain is running yet, so anything left in processing was interrupted
    store.recover_interrupted().await?;

    let transport = HttpTransport::new(&config.api_base_url, config.request_timeout)?;

    // Assume online until the probe says otherwise
    let connectivity = Connectivity::new(true);

    let store: Arc<dyn QueueStore> = Arc::new(store);
    let state = syncqueue::build_state(
        store.clone(),
        Arc::new(transport),
        connectivity.clone(),
        config.retry.clone(),
    );

    state.status.refresh_counts(store.as_ref()).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let probe = config.probe_interval.map(|interval| {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout.min(interval))
            .build()
            .expect("Failed to build reqwest client");
        tokio::spawn(connectivity::run_probe(
            client,
            config.probe_url(),
            interval,
            connectivity.clone(),
            shutdown_rx.clone(),
        ))
    });

    state.manager.start();

    let addr = SocketAddr::new(config.host, config.port);
    let app = syncqueue::build_app(state.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.manager.stop();
    let _ = shutdown_tx.send(true);
    if let Some(probe) = probe {
        let _ = probe.await;
    }

    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
