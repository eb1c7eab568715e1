//! # Passkey Ceremony Server
//!
//! Entry point: loads configuration, builds the shared state and serves the
//! ceremony endpoints over HTTP.

use passkey_ceremony::config::Config;
use passkey_ceremony::handlers;
use passkey_ceremony::state::AppState;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often stale challenges are swept from the ledger
const CLEANUP_INTERVAL_SECS: u64 = 600;

/// ## Startup
/// 1. Sets up logging (`RUST_LOG` overrides the default filter)
/// 2. Loads configuration from environment variables
/// 3. Initializes the in-memory stores and the verifier
/// 4. Starts a background task that purges expired challenges
/// 5. Starts the HTTP server
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,passkey_ceremony=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded: {:?}", config);

    let app_state = AppState::new(&config)?;
    tracing::info!(
        rp_id = %app_state.relying_party.id,
        origin = %app_state.relying_party.origin,
        "Application state initialized"
    );

    // Expiry is enforced on consume; the sweep only bounds memory held by
    // ceremonies that were started and never finished.
    if config.challenge_max_age().is_some() {
        let ledger = app_state.ledger.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(CLEANUP_INTERVAL_SECS));
            loop {
                interval.tick().await;
                let purged = ledger.purge_expired();
                tracing::debug!(purged, remaining = ledger.len(), "challenge cleanup");
            }
        });
    }

    let app = handlers::router(app_state);

    let bind_addr = config.bind_address();
    tracing::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
