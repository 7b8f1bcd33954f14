//! # Database Pool Management
//!
//! The process-wide store handle: one SQLite file, one long-lived
//! connection, one write lock.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Handle                                    │
//! │                                                                         │
//! │  App Startup                                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  AppConfig::load() ──► db_config() ──► DbConfig                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │  SqlitePool (1 long-lived connection)   │                           │
//! │  │  WriteLock  (one document write at once)│                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ├── db.customers() / products() / invoices() / payments()       │
//! │       ├── db.returns() / reports()                                     │
//! │       ▼                                                                 │
//! │  db.close().await ← explicit teardown on exit                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! File databases use WAL so a report query never blocks on a writer when
//! the pool is configured with more than one connection.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use khalifa_core::OversellPolicy;

use crate::error::{DbError, DbResult};
use crate::migrations::{self, MigrationStatus};
use crate::repository::customer::CustomerRepository;
use crate::repository::invoice::InvoiceRepository;
use crate::repository::payment::PaymentRepository;
use crate::repository::product::ProductRepository;
use crate::repository::report::ReportRepository;
use crate::repository::returns::ReturnRepository;

const IN_MEMORY: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// How to open the store.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/khalifa.db")
///     .oversell(OversellPolicy::Reject);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, or `:memory:`.
    pub database_path: PathBuf,

    /// Pool ceiling. Default: 1 (single user, single writer)
    pub max_connections: u32,

    /// Connections opened up front. Default: 1
    pub min_connections: u32,

    /// How long to wait for a free connection.
    /// Default: 30 seconds
    pub acquire_timeout: Duration,

    /// Apply pending migrations in `Database::new`. Default: true
    pub run_migrations: bool,

    /// What invoice creation does when stock runs short.
    /// Default: warn
    pub oversell: OversellPolicy,
}

impl DbConfig {
    /// File store at `path`; the file and its parent directory are created
    /// if missing.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 1,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            run_migrations: true,
            oversell: OversellPolicy::default(),
        }
    }

    /// Pool ceiling.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Connections opened up front.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection acquire timeout.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Skip or run migrations on open.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Sets the oversell policy.
    pub fn oversell(mut self, policy: OversellPolicy) -> Self {
        self.oversell = policy;
        self
    }

    /// Throwaway in-memory store for tests. It lives as long as its single connection, so the pool
    /// never recycles it.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(IN_MEMORY),
            max_connections: 1,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            run_migrations: true,
            oversell: OversellPolicy::default(),
        }
    }

    fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY
    }
}

// =============================================================================
// Write Lock
// =============================================================================

/// Serializes multi-statement writes so at most one write transaction is in
/// flight, whatever the pool size.
#[derive(Debug, Clone, Default)]
pub struct WriteLock(Arc<Mutex<()>>);

impl WriteLock {
    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.0.lock().await
    }
}

// =============================================================================
// Database
// =============================================================================

/// The store handle. Repositories are borrowed from it per call.
///
/// Created once at startup and passed by reference. Cloning is cheap and
/// shares the pool and write lock.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("khalifa.db")).await?;
///
/// let customer = db.customers().create(input).await?;
/// let created = db.invoices().create(&draft.finalize()?).await?;
/// println!("{}", created.invoice.number);
///
/// db.close().await;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    /// Never recycles its connection (see `Database::new`).
    pool: SqlitePool,

    /// Held for the duration of every multi-row write.
    write_lock: WriteLock,

    oversell: OversellPolicy,
}

impl Database {
    /// Opens the store.
    ///
    /// ## Steps
    /// 1. Create the file and its directory when missing
    /// 2. SQLite settings: WAL for files, `synchronous = NORMAL`, foreign keys on
    /// 3. Open the pool with no idle timeout or max lifetime
    /// 4. Apply migrations unless disabled
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Opening store"
        );

        let base_options = if config.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            if let Some(parent) = config.database_path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            SqliteConnectOptions::new()
                .filename(&config.database_path)
                .create_if_missing(true)
                // Report reads proceed while an invoice is being written
                .journal_mode(SqliteJournalMode::Wal)
        };

        let connect_options = base_options
            // WAL makes NORMAL crash-safe; only the last commit can be lost
            .synchronous(SqliteSynchronous::Normal)
            // SQLite has foreign keys disabled by default
            .foreign_keys(true);

        debug!(in_memory = config.is_in_memory(), "Connect options ready");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            oversell = %config.oversell,
            "Database pool created"
        );

        let db = Database {
            pool,
            write_lock: WriteLock::default(),
            oversell: config.oversell,
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations. Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await?;
        Ok(())
    }

    /// Embedded versus applied migrations.
    pub async fn migration_status(&self) -> DbResult<MigrationStatus> {
        migrations::migration_status(&self.pool).await
    }

    /// Raw pool for queries no repository covers.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Oversell policy applied by [`InvoiceRepository::create`].
    pub fn oversell(&self) -> OversellPolicy {
        self.oversell
    }

    /// Customers, balances and statements.
    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.pool.clone(), self.write_lock.clone())
    }

    /// Catalogue and stock.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let low = db.products().low_stock().await?;
    /// ```
    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone(), self.write_lock.clone())
    }

    /// Sales documents.
    pub fn invoices(&self) -> InvoiceRepository {
        InvoiceRepository::new(self.pool.clone(), self.write_lock.clone(), self.oversell)
    }

    /// Customer payments.
    pub fn payments(&self) -> PaymentRepository {
        PaymentRepository::new(self.pool.clone(), self.write_lock.clone())
    }

    /// Product returns against invoices.
    pub fn returns(&self) -> ReturnRepository {
        ReturnRepository::new(self.pool.clone(), self.write_lock.clone())
    }

    /// Returns the report repository (read-only aggregates).
    pub fn reports(&self) -> ReportRepository {
        ReportRepository::new(self.pool.clone())
    }

    /// Writes a consistent copy of the whole database to `target`.
    ///
    /// Uses `VACUUM INTO`, so the copy is compacted and the live database
    /// stays usable. Refuses to overwrite an existing file.
    pub async fn backup_to(&self, target: &Path) -> DbResult<()> {
        if target.exists() {
            return Err(DbError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("backup target {} already exists", target.display()),
            )));
        }
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let _guard = self.write_lock.acquire().await;
        info!(target = %target.display(), "Backing up database");

        sqlx::query("VACUUM INTO ?1")
            .bind(target.to_string_lossy().into_owned())
            .execute(&self.pool)
            .await?;

        info!("Backup complete");
        Ok(())
    }

    /// Explicit teardown. Afterwards all repository operations fail with
    /// `ConnectionFailed`.
    pub async fn close(&self) {
        info!("Closing store");
        self.pool.close().await;
    }

    /// `SELECT 1` round trip.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
