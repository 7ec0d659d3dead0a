use crate::error::{StorageError, StorageResult};
use sqlx::ConnectOptions;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Idempotent table definitions, run on every connect.
const SCHEMA: &str = include_str!("schema.sql");

/// Pool and connection settings for the SQLite database.
///
/// The defaults suit a single edge device: a handful of connections, WAL
/// journaling and a generous busy timeout so the recognition and remote
/// paths can log concurrently.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub database_path: String,
    pub max_connections: u32,
    /// Idle connections kept open.
    pub min_connections: u32,
    pub max_lifetime: Duration,
    pub acquire_timeout: Duration,
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout: Duration,
    pub create_if_missing: bool,
    /// Run the schema bootstrap after connecting.
    pub bootstrap_schema: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_path: smartlock_core::constants::DEFAULT_DATABASE_PATH.to_string(),
            max_connections: 5,
            min_connections: 1,
            max_lifetime: Duration::from_secs(30 * 60),
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(10),
            create_if_missing: true,
            bootstrap_schema: true,
        }
    }
}

impl DatabaseConfig {
    pub fn new(database_path: impl Into<String>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Default::default()
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    pub fn bootstrap_schema(mut self, bootstrap: bool) -> Self {
        self.bootstrap_schema = bootstrap;
        self
    }

    /// SQLite options for a file database: foreign keys on, WAL journal,
    /// statement logging off.
    fn connect_options(&self) -> StorageResult<SqliteConnectOptions> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", self.database_path))
            .map_err(|e| StorageError::Configuration(format!("Invalid database path: {e}")))?
            .create_if_missing(self.create_if_missing)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(self.busy_timeout)
            .disable_statement_logging();
        Ok(options)
    }
}

impl From<&smartlock_core::config::DatabaseSettings> for DatabaseConfig {
    fn from(settings: &smartlock_core::config::DatabaseSettings) -> Self {
        Self::new(settings.path.to_string_lossy()).max_connections(settings.max_connections)
    }
}

/// Database connection pool wrapper
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the pool, creating the file and its directory when missing.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use smartlock_storage::connection::{Database, DatabaseConfig};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = DatabaseConfig::new("smart_lock.db").max_connections(5);
    ///
    /// let db = Database::new(config).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(config: DatabaseConfig) -> StorageResult<Self> {
        let parent = Path::new(&config.database_path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty() && !p.exists());
        if let Some(parent) = parent {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Configuration(format!(
                    "Cannot create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let options = config.connect_options()?;
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .max_lifetime(Some(config.max_lifetime))
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await?;

        let db = Self { pool };

        if config.bootstrap_schema {
            db.bootstrap().await?;
        }

        info!(path = %config.database_path, "Database ready");
        Ok(db)
    }

    /// Single-connection in-memory database with the schema applied.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use smartlock_storage::connection::Database;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let db = Database::in_memory().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            // Each connection to :memory: is its own database.
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.bootstrap().await?;

        Ok(db)
    }

    /// Create any missing tables and indexes.
    ///
    /// Safe to run repeatedly. There is no schema versioning: columns are
    /// never altered by this call.
    pub async fn bootstrap(&self) -> StorageResult<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        debug!("Schema bootstrap complete");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for checked-out connections to return, then close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Round-trip a trivial query.
    pub async fn health_check(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
