//! # Database Pool Management
//!
//! Connection pool creation and configuration for SQLite.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  ledger-cli / tests                                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::new(path) ← Configure pool settings                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │   readers run in        │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │   parallel; writers     │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │   queue on the write    │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │   lock (busy_timeout)   │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  broadcast::Sender<DocumentChange> ← published after each commit       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! File databases use WAL so report reads never block a receipt being saved.
//! An in-memory database lives on exactly one connection that is never
//! recycled; closing it would drop the data.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::documents::{DocumentChange, DocumentStore, WriteTx};
use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::accountant::AccountantRepository;
use crate::repository::booking::BookingRepository;
use crate::repository::cancellation::CancellationRepository;
use crate::repository::counter::CounterRepository;
use crate::repository::outbox::OutboxRepository;
use crate::repository::receipt::ReceiptRepository;
use crate::repository::received_money::ReceivedMoneyRepository;
use crate::repository::reference::{AccessRepository, CatalogRepository};

const IN_MEMORY: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/ledger.db")
///     .max_connections(5)
///     .busy_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file, or `:memory:`.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection timeout duration.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection. `None` keeps connections.
    /// Default: 10 minutes
    pub idle_timeout: Option<Duration>,

    /// How long a writer waits for the write lock before failing as busy.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Buffered change notifications per subscriber.
    /// Default: 256
    pub change_capacity: usize,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a configuration for a database file, created if missing.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            busy_timeout: Duration::from_secs(5),
            change_capacity: 256,
            run_migrations: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the write-lock wait.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(IN_MEMORY),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: None,
            busy_timeout: Duration::from_secs(5),
            change_capacity: 256,
            run_migrations: true,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = if self.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };

        Ok(options
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout))
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access.
///
/// Cheap to clone; every clone shares the pool and the change feed.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./ledger.db")).await?;
/// let months = db.receipts().all_months().await?;
/// let mut changes = db.subscribe();
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    store: DocumentStore,
}

impl Database {
    /// Opens the pool and runs migrations (if enabled).
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let connect_options = config.connect_options()?;
        debug!("Connection options configured");

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout);
        if config.is_in_memory() {
            pool_options = pool_options.max_lifetime(None::<Duration>);
        }

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database {
            store: DocumentStore::new(pool, config.change_capacity),
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations. Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(self.pool()).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        self.store.pool()
    }

    /// Raw document access shared by the repositories.
    pub fn documents(&self) -> &DocumentStore {
        &self.store
    }

    /// Opens a write transaction holding the database write lock.
    pub async fn begin_write(&self) -> DbResult<WriteTx> {
        self.store.begin_write().await
    }

    /// Change notifications, one per document per commit.
    pub fn subscribe(&self) -> broadcast::Receiver<DocumentChange> {
        self.store.subscribe()
    }

    pub fn counters(&self) -> CounterRepository {
        CounterRepository::new(self.store.clone())
    }

    pub fn receipts(&self) -> ReceiptRepository {
        ReceiptRepository::new(self.store.clone())
    }

    pub fn bookings(&self) -> BookingRepository {
        BookingRepository::new(self.store.clone())
    }

    pub fn cancellations(&self) -> CancellationRepository {
        CancellationRepository::new(self.store.clone())
    }

    pub fn accountant(&self) -> AccountantRepository {
        AccountantRepository::new(self.store.clone())
    }

    pub fn received_money(&self) -> ReceivedMoneyRepository {
        ReceivedMoneyRepository::new(self.store.clone())
    }

    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.store.clone())
    }

    pub fn access(&self) -> AccessRepository {
        AccessRepository::new(self.store.clone())
    }

    pub fn outbox(&self) -> OutboxRepository {
        OutboxRepository::new(self.store.clone())
    }

    /// Closes the pool. Repository calls fail afterwards.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool().close().await;
    }

    /// True when the database answers a trivial query.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(self.pool()).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
