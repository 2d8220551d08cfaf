/// Database layer for authstore
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool with health check
/// - `database`: Target database URL derivation, creation and removal

pub mod database;
pub mod pool;
