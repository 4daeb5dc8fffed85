//! # titan-ext-core: Pure Business Logic for the Extension Modules
//!
//! This crate holds the bookkeeping rules of the three Titan POS extension
//! modules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Titan Extension Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Host POS (orders, products, front-end)               │   │
//! │  │   product saved ─► order created ─► footer ─► options page      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ HTTP / host events                     │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 ext-api (routes + hook dispatcher)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ titan-ext-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │  ┌────────────┐ ┌───────────────┐ ┌──────────┐ ┌────────────┐  │   │
//! │  │  │ containers │ │ manufacturing │ │ loyalty  │ │   hooks    │  │   │
//! │  │  │  ledger    │ │ BOM, orders   │ │ cashback │ │  payloads  │  │   │
//! │  │  └────────────┘ └───────────────┘ └──────────┘ └────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                titan-ext-db (Database Layer)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Host-facing records (Product, Customer, Order, account history)
//! - [`money`] - Integer-cents Money type
//! - [`containers`] - Container deposit ledger
//! - [`manufacturing`] - BOM costing, cycle detection, order state machine
//! - [`loyalty`] - Special-customer discount and yearly cashback
//! - [`settings`] - Module options with defaults
//! - [`hooks`] - Host event payloads
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use titan_ext_core::money::Money;
//! use titan_ext_core::types::Rate;
//!
//! let purchases = Money::from_cents(1_250_000); // $12,500.00
//! let cashback = purchases.apply_rate(Rate::from_bps(200)); // 2%
//! assert_eq!(cashback.cents(), 25_000);
//! ```

pub mod containers;
pub mod error;
pub mod hooks;
pub mod loyalty;
pub mod manufacturing;
pub mod money;
pub mod settings;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

/// Largest quantity accepted for any single movement, BOM line or order.
///
/// Guards against typos (1000000 instead of 100) turning into absurd
/// ledger entries.
pub const MAX_QUANTITY: i64 = 1_000_000;

/// Largest stored amount (price, cost, deposit fee) in cents: $10 billion.
pub const MAX_CENTS: i64 = 1_000_000_000_000;

/// Maximum rate in basis points (100%).
pub const MAX_RATE_BPS: i64 = 10_000;

/// Years accepted for cashback periods.
pub const MIN_CASHBACK_YEAR: i32 = 2000;
pub const MAX_CASHBACK_YEAR: i32 = 2100;

/// Generates a new entity ID (UUID v4).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
