/// Time-to-live enforcement
///
/// PostgreSQL has no native expiring index, so every index declared with an
/// `expire_after` grace period becomes an [`ExpiryPolicy`] and the
/// [`ExpirySweeper`] deletes rows whose indexed timestamp plus grace is in the
/// past. With the zero grace used by `tokens_expires_at_ttl_idx`, a token is
/// removed on the first sweep at or after its `expires_at`.
///
/// # Example
///
/// ```no_run
/// use authstore_shared::expiry::{policies, ExpirySweeper};
/// use sqlx::PgPool;
/// use std::time::Duration;
///
/// # async fn example(pool: PgPool) {
/// let sweeper = ExpirySweeper::new(pool, policies(), Duration::from_secs(60));
/// let shutdown = sweeper.shutdown_token();
///
/// tokio::spawn(async move { sweeper.run().await });
///
/// // Later, from a signal handler
/// shutdown.cancel();
/// # }
/// ```

use crate::error::StoreError;
use crate::schema;
use sqlx::PgPool;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Rows of `collection` expire once `field + grace` is in the past
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryPolicy {
    pub index: &'static str,
    pub collection: &'static str,
    pub field: &'static str,
    pub grace: Duration,
}

impl ExpiryPolicy {
    fn delete_sql(&self) -> String {
        format!(
            "DELETE FROM {} WHERE {} <= NOW() - make_interval(secs => $1)",
            self.collection, self.field
        )
    }
}

/// Expiry policies of every expiring index in the catalog
pub fn policies() -> Vec<ExpiryPolicy> {
    schema::indexes()
        .into_iter()
        .filter_map(|index| {
            index.expire_after.map(|grace| ExpiryPolicy {
                index: index.name,
                collection: index.collection,
                field: index.field,
                grace,
            })
        })
        .collect()
}

/// Deletes the expired rows of one policy
///
/// Returns the number of rows removed.
///
/// # Errors
///
/// Returns an error if the delete fails
pub async fn purge_expired(pool: &PgPool, policy: &ExpiryPolicy) -> Result<u64, StoreError> {
    let result = sqlx::query(&policy.delete_sql())
        .bind(policy.grace.as_secs_f64())
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Periodically purges expired rows until shut down
pub struct ExpirySweeper {
    pool: PgPool,
    policies: Vec<ExpiryPolicy>,
    interval: Duration,
    shutdown_token: CancellationToken,
}

impl ExpirySweeper {
    pub fn new(pool: PgPool, policies: Vec<ExpiryPolicy>, interval: Duration) -> Self {
        Self {
            pool,
            policies,
            interval,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Token that stops [`ExpirySweeper::run`] when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs one pass over every policy
    ///
    /// A failing policy is logged and does not stop the others. Returns the
    /// total number of rows removed.
    pub async fn sweep(&self) -> u64 {
        let mut removed = 0;

        for policy in &self.policies {
            match purge_expired(&self.pool, policy).await {
                Ok(0) => {}
                Ok(count) => {
                    tracing::info!(
                        index = policy.index,
                        collection = policy.collection,
                        count,
                        "Purged expired rows"
                    );
                    removed += count;
                }
                Err(e) => {
                    tracing::error!(
                        index = policy.index,
                        collection = policy.collection,
                        error = %e,
                        "Failed to purge expired rows"
                    );
                }
            }
        }

        removed
    }

    /// Sweeps immediately, then once per interval until the shutdown token is cancelled
    pub async fn run(&self) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            policies = self.policies.len(),
            "Expiry sweeper starting"
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    tracing::info!("Shutdown requested, stopping expiry sweeper");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = self.sweep().await;
                    tracing::debug!(removed, "Sweep complete");
                }
            }
        }
    }
}
