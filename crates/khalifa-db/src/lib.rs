//! # khalifa-db: Database Layer for Khalifa
//!
//! This crate provides database access for the Khalifa store manager.
//! It uses a single local SQLite file with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Khalifa Data Flow                                │
//! │                                                                         │
//! │  UI (save invoice)                                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    khalifa-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ Customer      │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ Product       │    │ 001_initial  │  │   │
//! │  │   │ WriteLock     │    │ Invoice       │    │ 002_return_  │  │   │
//! │  │   │ Oversell      │    │ Payment       │    │     status   │  │   │
//! │  │   │               │    │ Return        │    │              │  │   │
//! │  │   │               │    │ Report        │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   AppConfig (config.rs): defaults → khalifa.toml → KHALIFA_*   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   ~/.local/share/store/khalifa.db                               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Application configuration (file + environment)
//! - [`pool`] - Connection pool, write lock, backup
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use khalifa_db::{AppConfig, Database};
//!
//! let config = AppConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?;
//!
//! let low = db.products().low_stock().await?;
//! let balance = db.customers().balance(&customer_id).await?;
//!
//! db.close().await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::AppConfig;
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::{DeleteOutcome, Period};

// Repository re-exports for convenience
pub use repository::customer::CustomerRepository;
pub use repository::invoice::{CreatedInvoice, InvoiceFilter, InvoiceRepository};
pub use repository::payment::PaymentRepository;
pub use repository::product::{ProductFilter, ProductRepository};
pub use repository::report::ReportRepository;
pub use repository::returns::ReturnRepository;
