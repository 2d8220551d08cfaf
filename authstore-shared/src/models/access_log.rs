/// Access log model
///
/// An append-only record of login attempts. The application role is granted
/// `SELECT, INSERT` only, so rows cannot be changed after insertion through
/// that credential.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE access_logs (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     date_time TIMESTAMPTZ NOT NULL,
///     ip TEXT NOT NULL,
///     user_id UUID,
///     user_agent TEXT,
///     success BOOLEAN,
///     reason TEXT
/// );
/// CREATE INDEX access_logs_user_id_idx ON access_logs (user_id ASC);
/// CREATE INDEX access_logs_date_time_idx ON access_logs (date_time DESC);
/// ```

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Access log record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccessLog {
    pub id: Uuid,
    pub date_time: DateTime<Utc>,
    pub ip: String,
    pub user_id: Option<Uuid>,
    pub user_agent: Option<String>,
    pub success: Option<bool>,

    /// Why the attempt failed, if it did
    pub reason: Option<String>,
}

/// Input for appending an access log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendAccessLog {
    pub date_time: DateTime<Utc>,
    pub ip: String,
    pub user_id: Option<Uuid>,
    pub user_agent: Option<String>,
    pub success: Option<bool>,
    pub reason: Option<String>,
}

impl AppendAccessLog {
    /// Entry for an attempt happening now from `ip`
    pub fn now(ip: impl Into<String>) -> Self {
        Self {
            date_time: Utc::now(),
            ip: ip.into(),
            user_id: None,
            user_agent: None,
            success: None,
            reason: None,
        }
    }
}

impl AccessLog {
    /// Appends an entry
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] if a required field is missing and
    /// [`StoreError::Database`] for anything else.
    pub async fn append(pool: &PgPool, data: AppendAccessLog) -> Result<Self, StoreError> {
        let entry = sqlx::query_as::<_, AccessLog>(
            r#"
            INSERT INTO access_logs (date_time, ip, user_id, user_agent, success, reason)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, date_time, ip, user_id, user_agent, success, reason
            "#,
        )
        .bind(data.date_time)
        .bind(data.ip)
        .bind(data.user_id)
        .bind(data.user_agent)
        .bind(data.success)
        .bind(data.reason)
        .fetch_one(pool)
        .await?;

        Ok(entry)
    }

    /// Most recent entries first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn recent(pool: &PgPool, limit: i64) -> Result<Vec<Self>, StoreError> {
        let entries = sqlx::query_as::<_, AccessLog>(
            r#"
            SELECT id, date_time, ip, user_id, user_agent, success, reason
            FROM access_logs
            ORDER BY date_time DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(entries)
    }

    /// Most recent entries of one user first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn recent_for_user(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, StoreError> {
        let entries = sqlx::query_as::<_, AccessLog>(
            r#"
            SELECT id, date_time, ip, user_id, user_agent, success, reason
            FROM access_logs
            WHERE user_id = $1
            ORDER BY date_time DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_now_defaults() {
        let before = Utc::now();
        let entry = AppendAccessLog::now("10.0.0.1");

        assert_eq!(entry.ip, "10.0.0.1");
        assert!(entry.date_time >= before);
        assert!(entry.user_id.is_none());
        assert!(entry.success.is_none());
    }
}
