/// Refresh token model
///
/// Tokens are written by the authentication service when it issues or
/// rotates a refresh token. They are never deleted explicitly: the
/// `tokens_expires_at_ttl_idx` index carries a zero-second expiry and the
/// sweeper removes each row once `expires_at` has passed.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tokens (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL,
///     refresh_token TEXT NOT NULL,
///     expires_at TIMESTAMPTZ NOT NULL,
///     created_at TIMESTAMPTZ
/// );
/// CREATE INDEX tokens_user_id_idx ON tokens (user_id ASC);
/// CREATE INDEX tokens_expires_at_ttl_idx ON tokens (expires_at ASC);
/// ```
///
/// `user_id` is not a foreign key; the reference is not enforced by the store.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Refresh token record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Token {
    pub id: Uuid,
    pub user_id: Uuid,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Token {
    /// Returns true if the token is past its expiry at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Input for storing a refresh token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateToken {
    pub user_id: Uuid,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Token {
    /// Stores a refresh token, stamping `created_at` with the server time
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] if a required field is missing and
    /// [`StoreError::Database`] for anything else.
    pub async fn create(pool: &PgPool, data: CreateToken) -> Result<Self, StoreError> {
        let token = sqlx::query_as::<_, Token>(
            r#"
            INSERT INTO tokens (user_id, refresh_token, expires_at, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, user_id, refresh_token, expires_at, created_at
            "#,
        )
        .bind(data.user_id)
        .bind(data.refresh_token)
        .bind(data.expires_at)
        .fetch_one(pool)
        .await?;

        Ok(token)
    }

    /// Lists the tokens of a user, soonest expiry first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn find_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, StoreError> {
        let tokens = sqlx::query_as::<_, Token>(
            r#"
            SELECT id, user_id, refresh_token, expires_at, created_at
            FROM tokens
            WHERE user_id = $1
            ORDER BY expires_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_is_expired_at() {
        let now = Utc::now();
        let token = Token {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            refresh_token: "rt".to_string(),
            expires_at: now,
            created_at: None,
        };

        // Zero grace: expiry moment itself counts as expired
        assert!(token.is_expired_at(now));
        assert!(token.is_expired_at(now + Duration::seconds(1)));
        assert!(!token.is_expired_at(now - Duration::seconds(1)));
    }
}
