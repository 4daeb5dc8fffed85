//! # titan-ext-db: Database Layer for the Extension Modules
//!
//! SQLite persistence for the container ledger, manufacturing and loyalty
//! modules, plus the minimal host tables they work against.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ext-api (axum handlers, hook dispatcher)                              │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ★ titan-ext-db (THIS CRATE) ★                                         │
//! │  ├── pool          Database handle, DbConfig                           │
//! │  ├── migrations    embedded SQL                                         │
//! │  ├── repository    one repository per table group                      │
//! │  └── error         DbError                                              │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  titan-ext-core (rules, rows)            SQLite (WAL, FK on)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use titan_ext_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("titan-ext.db")).await?;
//!
//! let movement = db.containers().give(&input).await?;
//! let order = db.manufacturing().start(&order_id).await?;
//! let cashback = db.loyalty().process_for_customer(&customer_id, 2026).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::bom::BomRepository;
pub use repository::container::ContainerRepository;
pub use repository::customer::{CustomerRepository, NewCustomer};
pub use repository::loyalty::LoyaltyRepository;
pub use repository::manufacturing::ManufacturingOrderRepository;
pub use repository::order::{NewOrder, NewOrderLine, OrderRepository};
pub use repository::product::{NewProduct, ProductRepository};
pub use repository::settings::SettingsRepository;
