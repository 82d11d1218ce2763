use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gatekeeper_core::{
    create_entry_log_system, load_config, validate_config, SqliteTicketRepository, TicketCache,
    TicketRepository,
};
use gatekeeper_server::api::create_router;
use gatekeeper_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("GATEKEEPER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        "Configuration loaded successfully"
    );
    info!("Database path: {:?}", config.database.path);

    // Create SQLite repository
    let repository: Arc<dyn TicketRepository> = Arc::new(
        SqliteTicketRepository::new(&config.database.path)
            .context("Failed to open ticket repository")?,
    );
    info!("Ticket repository initialized");

    let cache = Arc::new(TicketCache::from_config(&config.cache));

    // Create entry-log write-back and spawn the writer task
    let (entry_log, writer) =
        create_entry_log_system(Arc::clone(&repository), config.write_back.clone());
    let writer_handle = tokio::spawn(writer.with_cache(Arc::clone(&cache)).run());

    let state = Arc::new(AppState::new(
        config.clone(),
        cache,
        repository,
        entry_log,
    ));

    // Hydrate before binding so no scan ever sees an empty cache
    let report = state
        .hydrator()
        .hydrate(state.cache())
        .await
        .context("Initial hydration failed")?;
    state.mark_ready();
    info!(
        team_tickets = report.team_tickets,
        concert_tickets = report.concert_tickets,
        members = report.members,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Ticket cache ready"
    );

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // The router (and with it the last EntryLogHandle) is gone, so the writer
    // drains its queue and exits.
    info!("Server shutting down, draining entry log...");
    match writer_handle.await {
        Ok(stats) => info!(
            written = stats.written,
            retried = stats.retried,
            dropped = stats.dropped,
            conflicts = stats.conflicts,
            "Entry-log writer stopped"
        ),
        Err(e) => error!("Entry-log writer task failed: {}", e),
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
