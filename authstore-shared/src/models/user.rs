/// User model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email TEXT NOT NULL CONSTRAINT users_email_check CHECK (email ~ '<email pattern>'),
///     password_hash TEXT NOT NULL CONSTRAINT users_password_hash_check CHECK (char_length(password_hash) >= 60),
///     user_type TEXT NOT NULL CONSTRAINT users_user_type_check CHECK (user_type IN ('EMPLOYEE', 'ADMIN')),
///     status TEXT NOT NULL CONSTRAINT users_status_check CHECK (status IN ('ACTIVE', 'INACTIVE', 'BLOCKED')),
///     created_at TIMESTAMPTZ,
///     updated_at TIMESTAMPTZ
/// );
/// CREATE UNIQUE INDEX users_email_key ON users (email ASC);
/// CREATE INDEX users_status_idx ON users (status ASC);
/// ```
///
/// # Example
///
/// ```no_run
/// use authstore_shared::models::user::{CreateUser, User, UserStatus, UserType};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let new_user = CreateUser::new(
///     "jane.doe@example.com",
///     "$argon2id$v=19$m=65536,t=3,p=4$...",
///     UserType::Employee,
///     UserStatus::Active,
/// );
///
/// let user = User::create(&pool, new_user).await?;
/// let found = User::find_by_email(&pool, "jane.doe@example.com").await?;
/// # Ok(())
/// # }
/// ```

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Kind of account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserType {
    Employee,
    Admin,
}

impl UserType {
    /// Converts the type to its stored form
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Employee => "EMPLOYEE",
            UserType::Admin => "ADMIN",
        }
    }

    /// Parses the stored form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "EMPLOYEE" => Some(UserType::Employee),
            "ADMIN" => Some(UserType::Admin),
            _ => None,
        }
    }
}

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Active,
    Inactive,
    Blocked,
}

impl UserStatus {
    /// Converts the status to its stored form
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "ACTIVE",
            UserStatus::Inactive => "INACTIVE",
            UserStatus::Blocked => "BLOCKED",
        }
    }

    /// Parses the stored form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(UserStatus::Active),
            "INACTIVE" => Some(UserStatus::Inactive),
            "BLOCKED" => Some(UserStatus::Blocked),
            _ => None,
        }
    }
}

/// User record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Store-generated ID
    pub id: Uuid,

    /// Unique email address
    pub email: String,

    /// Password digest (never plaintext)
    pub password_hash: String,

    /// Stored form of [`UserType`]
    pub user_type: String,

    /// Stored form of [`UserStatus`]
    pub status: String,

    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// Gets the parsed user type
    pub fn get_user_type(&self) -> Option<UserType> {
        UserType::parse(&self.user_type)
    }

    /// Gets the parsed status
    pub fn get_status(&self) -> Option<UserStatus> {
        UserStatus::parse(&self.status)
    }
}

/// Input for creating a user
///
/// `user_type` and `status` are raw strings so callers can write any value
/// and let the collection validator decide; use [`CreateUser::new`] for the
/// typed path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub password_hash: String,
    pub user_type: String,
    pub status: String,

    /// Stored as both `created_at` and `updated_at`
    pub created_at: DateTime<Utc>,
}

impl CreateUser {
    /// Typed constructor stamped with the current time
    pub fn new(
        email: impl Into<String>,
        password_hash: impl Into<String>,
        user_type: UserType,
        status: UserStatus,
    ) -> Self {
        Self {
            email: email.into(),
            password_hash: password_hash.into(),
            user_type: user_type.as_str().to_string(),
            status: status.as_str().to_string(),
            created_at: Utc::now(),
        }
    }
}

impl User {
    /// Inserts a user
    ///
    /// # Errors
    ///
    /// - [`StoreError::Validation`] if a field violates the `users` validator
    /// - [`StoreError::Duplicate`] if the email is already taken
    /// - [`StoreError::Database`] for anything else
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, user_type, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING id, email, password_hash, user_type, status, created_at, updated_at
            "#,
        )
        .bind(data.email)
        .bind(data.password_hash)
        .bind(data.user_type)
        .bind(data.status)
        .bind(data.created_at)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by email
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, user_type, status, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Counts all users
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn count(pool: &PgPool) -> Result<i64, StoreError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;

        Ok(count.0)
    }
}
