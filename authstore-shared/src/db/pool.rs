/// Connection pool for the provisioner and the sweeper
///
/// The provisioner makes one sequential pass and the sweeper issues one
/// `DELETE` per tick, so a pool only needs a URL, a connection cap and an
/// acquire timeout. [`create_pool`] fails fast when the server cannot answer
/// a trivial query.
///
/// # Example
///
/// ```no_run
/// use authstore_shared::db::pool::{close_pool, create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), sqlx::Error> {
/// let config = DatabaseConfig::for_url("postgresql://postgres@localhost/authstore")
///     .with_max_connections(2);
///
/// let pool = create_pool(config).await?;
/// close_pool(pool).await;
/// # Ok(())
/// # }
/// ```

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info};

/// Default connection cap
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Default time to wait for a free connection
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Pool settings for one database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    /// Default settings for the given URL
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }

    /// Caps the pool at `max_connections` (at least one)
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }
}

/// Connects a pool and checks that the server answers
///
/// # Errors
///
/// Returns an error if the URL is invalid or the server is unreachable.
pub async fn create_pool(config: DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    debug!(
        max_connections = config.max_connections,
        acquire_timeout_secs = config.acquire_timeout.as_secs(),
        "Connecting to database"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.url)
        .await?;

    let _: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&pool).await?;

    info!(max_connections = config.max_connections, "Connected to database");
    Ok(pool)
}

/// Waits for checked-out connections and closes the pool
pub async fn close_pool(pool: PgPool) {
    pool.close().await;
    debug!("Database pool closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_url_defaults() {
        let config = DatabaseConfig::for_url("postgresql://localhost/authstore");

        assert_eq!(config.url, "postgresql://localhost/authstore");
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.acquire_timeout, DEFAULT_ACQUIRE_TIMEOUT);
    }

    #[test]
    fn test_with_max_connections_keeps_one() {
        let config = DatabaseConfig::for_url("postgresql://localhost/authstore");

        assert_eq!(config.clone().with_max_connections(2).max_connections, 2);
        assert_eq!(config.with_max_connections(0).max_connections, 1);
    }

    #[tokio::test]
    async fn test_create_pool_rejects_invalid_url() {
        let result = create_pool(DatabaseConfig::for_url("not a url")).await;
        assert!(result.is_err());
    }
}
