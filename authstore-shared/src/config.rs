/// Configuration management
///
/// Both binaries are configured from environment variables (a `.env` file is
/// honoured in development). Nothing is passed on the command line.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL server URL with administrative privileges (required)
/// - `AUTHSTORE_DB_NAME`: Logical database to provision (default: authstore)
/// - `AUTHSTORE_APP_USER`: Application role name (default: authstore_app)
/// - `AUTHSTORE_APP_PASSWORD`: Application role password (required by the provisioner)
/// - `SEED_ADMIN_EMAIL`: Seed administrator email (default: admin@authstore.local)
/// - `SEED_ADMIN_PASSWORD_HASH`: Precomputed seed password hash (optional)
/// - `SEED_ADMIN_PASSWORD`: Seed password to hash with Argon2id (optional)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 5)
/// - `SWEEP_INTERVAL_SECONDS`: Expiry sweep period (default: 60)
/// - `LOG_FORMAT`: `text` or `json` (default: text)
///
/// # Example
///
/// ```no_run
/// use authstore_shared::config::ProvisionConfig;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = ProvisionConfig::from_env()?;
/// println!("Provisioning database {}", config.database_name);
/// # Ok(())
/// # }
/// ```

use crate::db::database::target_database_url;
use std::env;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_DATABASE_NAME: &str = "authstore";
pub const DEFAULT_APP_USER: &str = "authstore_app";
pub const DEFAULT_SEED_EMAIL: &str = "admin@authstore.local";
pub use crate::db::pool::DEFAULT_MAX_CONNECTIONS;
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60;

/// Output format of the log subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Reads `LOG_FORMAT`, falling back to text for unknown values
    pub fn from_env() -> Self {
        env::var("LOG_FORMAT")
            .ok()
            .and_then(|value| Self::parse(&value))
            .unwrap_or_default()
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Some(LogFormat::Text),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Credential of the database-scoped application role
#[derive(Clone)]
pub struct AppCredential {
    pub name: String,
    pub password: String,
}

impl fmt::Debug for AppCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppCredential")
            .field("name", &self.name)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where the seed administrator's password hash comes from
#[derive(Clone, PartialEq, Eq)]
pub enum SeedSecret {
    /// Precomputed hash, stored as given
    Hash(String),

    /// Plaintext password, hashed with Argon2id before storage
    Password(String),

    /// Nothing supplied: a random password is generated and printed once
    Generate,
}

impl fmt::Debug for SeedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedSecret::Hash(_) => f.write_str("Hash(<redacted>)"),
            SeedSecret::Password(_) => f.write_str("Password(<redacted>)"),
            SeedSecret::Generate => f.write_str("Generate"),
        }
    }
}

/// Seed administrator settings
#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub email: String,
    pub secret: SeedSecret,
}

/// Provisioner configuration
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    /// Administrative server URL
    pub server_url: String,

    /// Logical database to provision
    pub database_name: String,

    /// Application role to ensure
    pub app: AppCredential,

    /// Seed administrator
    pub seed: SeedConfig,

    pub max_connections: u32,
}

impl ProvisionConfig {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does not parse.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_url = lookup("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let database_name = non_empty(&lookup, "AUTHSTORE_DB_NAME")
            .unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_string());

        let app_name =
            non_empty(&lookup, "AUTHSTORE_APP_USER").unwrap_or_else(|| DEFAULT_APP_USER.to_string());

        let app_password = non_empty(&lookup, "AUTHSTORE_APP_PASSWORD").ok_or_else(|| {
            anyhow::anyhow!("AUTHSTORE_APP_PASSWORD environment variable is required")
        })?;

        let seed_email =
            non_empty(&lookup, "SEED_ADMIN_EMAIL").unwrap_or_else(|| DEFAULT_SEED_EMAIL.to_string());

        let secret = match (
            non_empty(&lookup, "SEED_ADMIN_PASSWORD_HASH"),
            non_empty(&lookup, "SEED_ADMIN_PASSWORD"),
        ) {
            (Some(_), Some(_)) => anyhow::bail!(
                "Set only one of SEED_ADMIN_PASSWORD_HASH and SEED_ADMIN_PASSWORD"
            ),
            (Some(hash), None) => SeedSecret::Hash(hash),
            (None, Some(password)) => SeedSecret::Password(password),
            (None, None) => SeedSecret::Generate,
        };

        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;

        // Fail early on a server URL that cannot carry a database name
        target_database_url(&server_url, &database_name)?;

        Ok(Self {
            server_url,
            database_name,
            app: AppCredential {
                name: app_name,
                password: app_password,
            },
            seed: SeedConfig {
                email: seed_email,
                secret,
            },
            max_connections,
        })
    }

    /// URL of the provisioned database on the administrative server
    pub fn target_url(&self) -> anyhow::Result<String> {
        Ok(target_database_url(&self.server_url, &self.database_name)?)
    }
}

/// Expiry sweeper configuration
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// URL of the provisioned database
    pub database_url: String,

    /// Time between sweeps
    pub interval: Duration,

    pub max_connections: u32,
}

impl SweeperConfig {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does not parse.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_url = lookup("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let database_name = non_empty(&lookup, "AUTHSTORE_DB_NAME")
            .unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_string());

        let interval_seconds =
            parse_or(&lookup, "SWEEP_INTERVAL_SECONDS", DEFAULT_SWEEP_INTERVAL_SECONDS)?;
        if interval_seconds == 0 {
            anyhow::bail!("SWEEP_INTERVAL_SECONDS must be at least 1");
        }

        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;

        Ok(Self {
            database_url: target_database_url(&server_url, &database_name)?,
            interval: Duration::from_secs(interval_seconds),
            max_connections,
        })
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|value| !value.trim().is_empty())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty(lookup, key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value {:?}: {}", key, value, e)),
        None => Ok(default),
    }
}
