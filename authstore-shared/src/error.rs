/// Store error classification
///
/// Every write against a provisioned collection returns `StoreError`, which
/// separates the two failures callers are expected to act on from everything
/// else:
///
/// - [`StoreError::Validation`]: the row violated a collection validator
///   (a `CHECK` or `NOT NULL` constraint, or a value of the wrong type)
/// - [`StoreError::Duplicate`]: the row collided with a unique index
/// - [`StoreError::Database`]: any other database or connection failure
///
/// # Example
///
/// ```no_run
/// use authstore_shared::error::StoreError;
/// use authstore_shared::models::user::{CreateUser, User, UserStatus, UserType};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) {
/// let data = CreateUser::new("not-an-email", "short", UserType::Employee, UserStatus::Active);
///
/// match User::create(&pool, data).await {
///     Err(StoreError::Validation { constraint, .. }) => println!("rejected by {:?}", constraint),
///     Err(StoreError::Duplicate { .. }) => println!("email already taken"),
///     Err(e) => println!("store failure: {}", e),
///     Ok(user) => println!("created {}", user.id),
/// }
/// # }
/// ```

use sqlx::error::ErrorKind;
use thiserror::Error;

/// SQLSTATE class for data exceptions (malformed value for the column type)
const DATA_EXCEPTION_CLASS: &str = "22";

/// SQLSTATEs raised when a bound value has the wrong type for its column
const TYPE_MISMATCH_CODES: [&str; 2] = [
    "42804", // datatype_mismatch
    "42846", // cannot_coerce
];

/// SQLSTATE raised when a role or other object already exists
pub const DUPLICATE_OBJECT: &str = "42710";

/// SQLSTATE raised when creating a database that already exists
pub const DUPLICATE_DATABASE: &str = "42P04";

/// Errors surfaced by writes and reads against the store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Row rejected by a collection validator
    #[error("Validation failed ({}): {message}", .constraint.as_deref().unwrap_or("unnamed constraint"))]
    Validation {
        /// Name of the violated constraint, if the server reported one
        constraint: Option<String>,
        /// Server message
        message: String,
    },

    /// Row rejected by a unique index
    #[error("Duplicate key ({}): {message}", .constraint.as_deref().unwrap_or("unnamed index"))]
    Duplicate {
        /// Name of the unique index, if the server reported one
        constraint: Option<String>,
        /// Server message
        message: String,
    },

    /// Any other database or connection error
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    /// Returns true if the store rejected the row through a validator
    pub fn is_validation(&self) -> bool {
        matches!(self, StoreError::Validation { .. })
    }

    /// Returns true if the store rejected the row through a unique index
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate { .. })
    }

    /// Returns the constraint or index name reported by the server
    pub fn constraint(&self) -> Option<&str> {
        match self {
            StoreError::Validation { constraint, .. } | StoreError::Duplicate { constraint, .. } => {
                constraint.as_deref()
            }
            StoreError::Database(_) => None,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let sqlx::Error::Database(db_err) = &err else {
            return StoreError::Database(err);
        };

        let constraint = db_err.constraint().map(str::to_string);
        let message = db_err.message().to_string();

        match db_err.kind() {
            ErrorKind::UniqueViolation => StoreError::Duplicate { constraint, message },
            ErrorKind::CheckViolation | ErrorKind::NotNullViolation => {
                StoreError::Validation { constraint, message }
            }
            _ if db_err.code().is_some_and(|code| {
                code.starts_with(DATA_EXCEPTION_CLASS) || TYPE_MISMATCH_CODES.contains(&&*code)
            }) =>
            {
                StoreError::Validation { constraint, message }
            }
            _ => StoreError::Database(err),
        }
    }
}

/// Returns the SQLSTATE of a database error, if any
pub fn sqlstate(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().map(|code| code.into_owned()),
        _ => None,
    }
}
