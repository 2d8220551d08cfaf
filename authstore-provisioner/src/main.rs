//! # authstore Provisioner
//!
//! Run-once job that prepares a PostgreSQL server for the authentication
//! service: target database, application role, the `users`, `tokens` and
//! `access_logs` collections with their validators, six indexes and the seed
//! administrator. Every step is idempotent, so the job can run on each
//! deployment.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p authstore-provisioner            # provision
//! cargo run -p authstore-provisioner -- status  # report what exists
//! ```
//!
//! Configuration is read from the environment (and `.env`); see
//! `authstore_shared::config`.

use anyhow::Context;
use authstore_shared::config::{LogFormat, ProvisionConfig};
use authstore_shared::db::pool::{close_pool, create_pool, DatabaseConfig};
use authstore_shared::provision::{inspect, Provisioner};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(LogFormat::from_env());

    tracing::info!(
        "authstore Provisioner v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = ProvisionConfig::from_env().context("Failed to load configuration")?;

    match std::env::args().nth(1).as_deref() {
        None | Some("provision") => provision(config).await,
        Some("status") => status(config).await,
        Some(other) => anyhow::bail!("Unknown command {:?} (expected provision or status)", other),
    }
}

fn init_tracing(format: LogFormat) {
    let json = format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "authstore_provisioner=info,authstore_shared=info".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

async fn provision(config: ProvisionConfig) -> anyhow::Result<()> {
    let report = Provisioner::new(config)
        .provision()
        .await
        .context("Provisioning failed")?;

    if let Some(password) = &report.generated_password {
        // Printed once; never logged
        println!("Generated password for {}: {}", report.seed_email, password);
    }

    tracing::info!("{}", report);

    Ok(())
}

async fn status(config: ProvisionConfig) -> anyhow::Result<()> {
    let pool = create_pool(DatabaseConfig::for_url(config.target_url()?))
        .await
        .context("Failed to connect to target database")?;

    let result = inspect(&pool, &config.app.name, &config.seed.email).await;
    close_pool(pool).await;
    let status = result?;

    tracing::info!(role = %config.app.name, present = status.role, "Credential");
    for (name, present) in &status.collections {
        tracing::info!(collection = %name, present, "Collection");
    }
    for (name, present) in &status.indexes {
        tracing::info!(index = %name, present, "Index");
    }
    tracing::info!(email = %config.seed.email, present = status.seeded, "Seed administrator");

    if status.is_complete() {
        tracing::info!(database = %config.database_name, "Database is fully provisioned");
        Ok(())
    } else {
        anyhow::bail!("Database {} is not fully provisioned", config.database_name)
    }
}
