/// Idempotent provisioning of the authentication store
///
/// [`Provisioner::provision`] brings a PostgreSQL server to the state the
/// authentication service expects and is safe to run on every container
/// start. Each step checks the catalogs before it creates anything:
///
/// 1. Select the target database by name, creating it if absent
/// 2. Ensure the application role (`pg_roles`), then grant it `CONNECT`/`USAGE`
/// 3. Ensure each collection with its validator (`information_schema.tables`)
///    and grant the role read/write access
/// 4. Ensure each index (`pg_indexes`); a same-named index with different
///    options is a conflict, not a no-op
/// 5. Insert the seed administrator; a unique violation on the email means
///    it is already seeded
/// 6. Return a [`ProvisionReport`] for the caller to log
///
/// The collection and index catalog is checked before the first write, so a
/// malformed definition aborts without touching the server.
///
/// # Example
///
/// ```no_run
/// use authstore_shared::config::ProvisionConfig;
/// use authstore_shared::provision::Provisioner;
///
/// # async fn example() -> anyhow::Result<()> {
/// let provisioner = Provisioner::new(ProvisionConfig::from_env()?);
/// let report = provisioner.provision().await?;
/// println!("{}", report);
/// # Ok(())
/// # }
/// ```

pub mod seed;

use crate::auth::password::PasswordError;
use crate::config::{AppCredential, ProvisionConfig};
use crate::db::database::{ensure_database_exists, target_database_url};
use crate::db::pool::{close_pool, create_pool, DatabaseConfig};
use crate::error::{sqlstate, StoreError, DUPLICATE_OBJECT};
use crate::models::user::{CreateUser, User, UserStatus, UserType};
use crate::schema::ddl::{quote_ident, quote_literal, recorded_expiry};
use crate::schema::{self, CollectionSpec, IndexSpec, SchemaError};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use seed::SeedAdmin;

/// Fatal provisioning errors
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// A collection or index definition is malformed
    #[error("Invalid schema definition: {0}")]
    InvalidSchema(#[from] SchemaError),

    /// The seed administrator would be rejected by the `users` validator
    #[error("Invalid seed administrator: {0}")]
    InvalidSeed(validator::ValidationErrors),

    /// Hashing the seed password failed
    #[error(transparent)]
    Password(#[from] PasswordError),

    /// The server URL cannot address the target database
    #[error("Invalid database URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Creating the application role failed for a reason other than "already exists"
    #[error("Failed to create role {role}: {source}")]
    Credential {
        role: String,
        #[source]
        source: sqlx::Error,
    },

    /// An index with the same name exists with different options
    #[error("Index {index} already exists with different options: {existing}")]
    IndexConflict { index: String, existing: String },

    /// A record write failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Any other database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result of an ensure step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    AlreadyExists,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Created => f.write_str("created"),
            Outcome::AlreadyExists => f.write_str("already exists"),
        }
    }
}

/// Result of the seed step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Inserted { id: Uuid },
    AlreadySeeded,
}

/// What a provisioning run did
#[derive(Debug, Clone)]
pub struct ProvisionReport {
    pub database_name: String,
    pub database: Outcome,
    pub credential: Outcome,
    pub collections: Vec<(String, Outcome)>,
    pub indexes: Vec<(String, Outcome)>,
    pub seed: SeedOutcome,
    pub seed_email: String,

    /// Plaintext of the seed password when it was generated by this run
    pub generated_password: Option<String>,
}

impl ProvisionReport {
    fn created(items: &[(String, Outcome)]) -> usize {
        items
            .iter()
            .filter(|(_, outcome)| *outcome == Outcome::Created)
            .count()
    }
}

impl fmt::Display for ProvisionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seed = match self.seed {
            SeedOutcome::Inserted { .. } => "seeded",
            SeedOutcome::AlreadySeeded => "already seeded",
        };

        write!(
            f,
            "Database {} provisioned successfully (database {}, credential {}, {}/{} collections created, {}/{} indexes created, admin {} {})",
            self.database_name,
            self.database,
            self.credential,
            Self::created(&self.collections),
            self.collections.len(),
            Self::created(&self.indexes),
            self.indexes.len(),
            self.seed_email,
            seed
        )
    }
}

/// Applies the collection/index catalog and the seed record to a server
#[derive(Debug, Clone)]
pub struct Provisioner {
    config: ProvisionConfig,
}

impl Provisioner {
    pub fn new(config: ProvisionConfig) -> Self {
        Self { config }
    }

    /// Runs every provisioning step in order
    ///
    /// # Errors
    ///
    /// Returns the first fatal error; see [`ProvisionError`]. "Already
    /// exists" conditions and the seed duplicate key are not errors.
    pub async fn provision(&self) -> Result<ProvisionReport, ProvisionError> {
        let collections = schema::collections();
        let indexes = schema::indexes();
        check_catalog(&collections, &indexes)?;

        let seed = SeedAdmin::resolve(&self.config.seed)?;

        info!(database = %self.config.database_name, "Selecting target database");
        let target_url = target_database_url(&self.config.server_url, &self.config.database_name)?;
        let database = if ensure_database_exists(&target_url).await? {
            Outcome::Created
        } else {
            Outcome::AlreadyExists
        };

        let pool = create_pool(
            DatabaseConfig::for_url(target_url).with_max_connections(self.config.max_connections),
        )
        .await?;

        let result = self
            .provision_database(&pool, &collections, &indexes, &seed)
            .await;

        close_pool(pool).await;

        let (credential, collections, indexes, seed_outcome) = result?;

        Ok(ProvisionReport {
            database_name: self.config.database_name.clone(),
            database,
            credential,
            collections,
            indexes,
            seed: seed_outcome,
            seed_email: seed.email,
            generated_password: match seed_outcome {
                SeedOutcome::Inserted { .. } => seed.generated_password,
                SeedOutcome::AlreadySeeded => None,
            },
        })
    }

    #[allow(clippy::type_complexity)]
    async fn provision_database(
        &self,
        pool: &PgPool,
        collections: &[CollectionSpec],
        indexes: &[IndexSpec],
        seed: &SeedAdmin,
    ) -> Result<
        (
            Outcome,
            Vec<(String, Outcome)>,
            Vec<(String, Outcome)>,
            SeedOutcome,
        ),
        ProvisionError,
    > {
        let credential = ensure_role(pool, &self.config.app, &self.config.database_name).await?;

        let mut collection_outcomes = Vec::with_capacity(collections.len());
        for spec in collections {
            let outcome = ensure_collection(pool, spec, &self.config.app.name).await?;
            collection_outcomes.push((spec.name.to_string(), outcome));
        }

        let mut index_outcomes = Vec::with_capacity(indexes.len());
        for spec in indexes {
            let outcome = ensure_index(pool, spec).await?;
            index_outcomes.push((spec.name.to_string(), outcome));
        }

        let seed_outcome = seed_admin(pool, seed, Utc::now()).await?;

        Ok((credential, collection_outcomes, index_outcomes, seed_outcome))
    }
}

/// Validates every collection and index definition
///
/// # Errors
///
/// Returns the first [`SchemaError`] found.
pub fn check_catalog(
    collections: &[CollectionSpec],
    indexes: &[IndexSpec],
) -> Result<(), ProvisionError> {
    for collection in collections {
        collection.validate()?;
    }
    for index in indexes {
        index.validate_against(collections)?;
    }
    Ok(())
}

/// Ensures the application role exists and may connect to `database`
///
/// An existing role keeps its current password. `PUBLIC` loses its default
/// `CONNECT`/`TEMPORARY` on the database and `CREATE` on its `public` schema,
/// so the application role is the only non-superuser that can reach it.
/// Defaults `PUBLIC` holds on other databases of the server are left alone.
///
/// # Errors
///
/// Returns [`ProvisionError::Credential`] if the role cannot be created and
/// [`ProvisionError::Database`] if the grants fail.
pub async fn ensure_role(
    pool: &PgPool,
    app: &AppCredential,
    database: &str,
) -> Result<Outcome, ProvisionError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT FROM pg_roles WHERE rolname = $1)")
        .bind(&app.name)
        .fetch_one(pool)
        .await?;

    let outcome = if exists {
        info!(role = %app.name, "Application role already exists");
        Outcome::AlreadyExists
    } else {
        let create = format!(
            "CREATE ROLE {} LOGIN PASSWORD {}",
            quote_ident(&app.name),
            quote_literal(&app.password)
        );

        match sqlx::query(&create).execute(pool).await {
            Ok(_) => {
                info!(role = %app.name, "Created application role");
                Outcome::Created
            }
            // Created concurrently between the check and the create
            Err(e) if sqlstate(&e).as_deref() == Some(DUPLICATE_OBJECT) => {
                warn!(role = %app.name, "Application role appeared during provisioning");
                Outcome::AlreadyExists
            }
            Err(source) => {
                return Err(ProvisionError::Credential {
                    role: app.name.clone(),
                    source,
                })
            }
        }
    };

    for statement in role_scope_sql(&app.name, database) {
        sqlx::query(&statement).execute(pool).await?;
    }

    Ok(outcome)
}

/// Statements confining `role` to `database`, in execution order
pub fn role_scope_sql(role: &str, database: &str) -> Vec<String> {
    let role = quote_ident(role);
    let database = quote_ident(database);

    vec![
        format!("REVOKE ALL ON DATABASE {} FROM PUBLIC", database),
        "REVOKE CREATE ON SCHEMA public FROM PUBLIC".to_string(),
        format!("GRANT CONNECT ON DATABASE {} TO {}", database, role),
        format!("GRANT USAGE ON SCHEMA public TO {}", role),
    ]
}

/// Ensures a collection exists with its validator and grants `role` access
///
/// An existing collection is left untouched apart from the grants.
///
/// # Errors
///
/// Returns [`ProvisionError::Database`] if a statement fails.
pub async fn ensure_collection(
    pool: &PgPool,
    spec: &CollectionSpec,
    role: &str,
) -> Result<Outcome, ProvisionError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = current_schema()
            AND table_name = $1
        )",
    )
    .bind(spec.name)
    .fetch_one(pool)
    .await?;

    let outcome = if exists {
        debug!(collection = spec.name, "Collection already exists");
        Outcome::AlreadyExists
    } else {
        sqlx::query(&spec.create_table_sql()).execute(pool).await?;
        info!(
            collection = spec.name,
            required = ?spec.required_fields(),
            "Created collection with validator"
        );
        Outcome::Created
    };

    sqlx::query(&spec.grant_sql(role)).execute(pool).await?;
    if let Some(revoke) = spec.revoke_sql(role) {
        sqlx::query(&revoke).execute(pool).await?;
    }

    Ok(outcome)
}

/// Existing index as reported by the catalogs
#[derive(Debug, sqlx::FromRow)]
struct ExistingIndex {
    tablename: String,
    indexdef: String,
    comment: Option<String>,
}

/// Ensures an index exists with the declared options
///
/// # Errors
///
/// Returns [`ProvisionError::IndexConflict`] if an index of the same name
/// exists on another collection or with different uniqueness, key or expiry,
/// and [`ProvisionError::Database`] if a statement fails.
pub async fn ensure_index(pool: &PgPool, spec: &IndexSpec) -> Result<Outcome, ProvisionError> {
    let existing = sqlx::query_as::<_, ExistingIndex>(
        "SELECT i.tablename::text AS tablename,
                i.indexdef,
                obj_description(c.oid, 'pg_class') AS comment
         FROM pg_indexes i
         JOIN pg_namespace n ON n.nspname = i.schemaname
         JOIN pg_class c ON c.relname = i.indexname AND c.relnamespace = n.oid
         WHERE i.schemaname = current_schema()
         AND i.indexname = $1",
    )
    .bind(spec.name)
    .fetch_optional(pool)
    .await?;

    let Some(existing) = existing else {
        sqlx::query(&spec.create_index_sql()).execute(pool).await?;
        if let Some(comment) = spec.comment_sql() {
            sqlx::query(&comment).execute(pool).await?;
        }

        info!(
            index = spec.name,
            collection = spec.collection,
            field = spec.field,
            unique = spec.unique,
            expire_after_seconds = spec.expire_after.map(|grace| grace.as_secs()),
            "Created index"
        );
        return Ok(Outcome::Created);
    };

    if existing.tablename == spec.collection
        && spec.matches_existing(&existing.indexdef, existing.comment.as_deref())
    {
        debug!(index = spec.name, "Index already exists");
        return Ok(Outcome::AlreadyExists);
    }

    // Only a missing expiry comment, left by an interrupted run, is repaired
    if existing.tablename != spec.collection
        || !spec.matches_key(&existing.indexdef)
        || recorded_expiry(existing.comment.as_deref()).is_some()
    {
        return Err(ProvisionError::IndexConflict {
            index: spec.name.to_string(),
            existing: existing.indexdef,
        });
    }

    if let Some(comment) = spec.comment_sql() {
        sqlx::query(&comment).execute(pool).await?;
        info!(index = spec.name, "Recorded expiry on existing index");
    }

    Ok(Outcome::AlreadyExists)
}

/// Inserts the seed administrator
///
/// A unique violation on `users.email` is the expected outcome of a re-run
/// and is reported as [`SeedOutcome::AlreadySeeded`].
///
/// # Errors
///
/// Returns [`ProvisionError::Store`] for validation failures and any other
/// store error.
pub async fn seed_admin(
    pool: &PgPool,
    seed: &SeedAdmin,
    now: DateTime<Utc>,
) -> Result<SeedOutcome, ProvisionError> {
    let data = CreateUser {
        created_at: now,
        ..CreateUser::new(
            seed.email.clone(),
            seed.password_hash.clone(),
            UserType::Admin,
            UserStatus::Active,
        )
    };

    match User::create(pool, data).await {
        Ok(user) => {
            info!(email = %user.email, id = %user.id, "Seeded administrator");
            Ok(SeedOutcome::Inserted { id: user.id })
        }
        Err(StoreError::Duplicate { constraint, .. })
            if constraint.as_deref().map_or(true, |c| c == "users_email_key") =>
        {
            info!(email = %seed.email, "Administrator already seeded");
            Ok(SeedOutcome::AlreadySeeded)
        }
        Err(e) => Err(e.into()),
    }
}

/// Presence of each provisioned object, without changing anything
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionStatus {
    pub role: bool,
    pub collections: Vec<(String, bool)>,
    pub indexes: Vec<(String, bool)>,
    pub seeded: bool,
}

impl ProvisionStatus {
    /// Whether every object of the catalog is present
    pub fn is_complete(&self) -> bool {
        self.role
            && self.seeded
            && self.collections.iter().all(|(_, present)| *present)
            && self.indexes.iter().all(|(_, present)| *present)
    }
}

/// Reports which provisioned objects exist in the connected database
///
/// # Errors
///
/// Returns an error if a catalog query fails
pub async fn inspect(
    pool: &PgPool,
    role: &str,
    seed_email: &str,
) -> Result<ProvisionStatus, ProvisionError> {
    let role_exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT FROM pg_roles WHERE rolname = $1)")
            .bind(role)
            .fetch_one(pool)
            .await?;

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT table_name::text FROM information_schema.tables WHERE table_schema = current_schema()",
    )
    .fetch_all(pool)
    .await?;

    let index_names: Vec<String> = sqlx::query_scalar(
        "SELECT indexname::text FROM pg_indexes WHERE schemaname = current_schema()",
    )
    .fetch_all(pool)
    .await?;

    let seeded = tables.iter().any(|t| t == schema::USERS)
        && User::find_by_email(pool, seed_email).await?.is_some();

    Ok(ProvisionStatus {
        role: role_exists,
        collections: schema::collections()
            .iter()
            .map(|c| (c.name.to_string(), tables.iter().any(|t| t == c.name)))
            .collect(),
        indexes: schema::indexes()
            .iter()
            .map(|i| (i.name.to_string(), index_names.iter().any(|n| n == i.name)))
            .collect(),
        seeded,
    })
}
