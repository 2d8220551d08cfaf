//! # authstore Sweeper
//!
//! Long-running process that enforces the time-to-live indexes of the
//! authentication store by deleting expired rows on a fixed interval.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/authstore cargo run -p authstore-sweeper
//! ```

use anyhow::Context;
use authstore_shared::config::{LogFormat, SweeperConfig};
use authstore_shared::db::pool::{close_pool, create_pool, DatabaseConfig};
use authstore_shared::expiry::{policies, ExpirySweeper};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(LogFormat::from_env());

    tracing::info!(
        "authstore Sweeper v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = SweeperConfig::from_env().context("Failed to load configuration")?;

    let pool = create_pool(
        DatabaseConfig::for_url(config.database_url.clone())
            .with_max_connections(config.max_connections),
    )
    .await
    .context("Failed to connect to database")?;

    let sweeper = ExpirySweeper::new(pool.clone(), policies(), config.interval);
    let shutdown = sweeper.shutdown_token();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
        }
        shutdown.cancel();
    });

    sweeper.run().await;
    close_pool(pool).await;

    tracing::info!("Sweeper stopped");

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let json = format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "authstore_sweeper=info,authstore_shared=info".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}
