//! Application entry point and server initialization
//!
//! Loads configuration, opens the database, repairs any drifted
//! recommendation counters, then serves until SIGINT/SIGTERM.

use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use recommender::config::Config;
use recommender::database::init_db;
use recommender::recommendation_service::RecommendationService;
use recommender::route::create_app;
use recommender::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("recommender=debug,tower_http=debug")),
        )
        .init();

    let config = Config::from_env()?;
    let port = config.port;

    let store = init_db(&config.database_path)?;
    info!(path = %config.database_path, "database ready");

    let corrected = RecommendationService::new(&store).reconcile_counts()?;
    info!(corrected, "recommendation counters reconciled");

    let state = AppState::new(store, config);
    let app = create_app(state).layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!("listening on http://localhost:{}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on Unix, letting in-flight requests and
/// open write transactions finish before the process exits
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, stopping server");
}
