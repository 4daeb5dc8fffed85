//! # Domain Types
//!
//! Host-facing records the extension modules read and write.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Host Records (mirrored)                            │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌──────────────────────┐  │
//! │  │    Product      │   │    Customer     │   │       Order          │  │
//! │  │  ─────────────  │   │  ─────────────  │   │  ──────────────────  │  │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id, code            │  │
//! │  │  sku            │   │  is_special     │   │  customer_id?        │  │
//! │  │  cost_cents     │   │  account_balance│   │  total_cents         │  │
//! │  │  current_stock  │   │                 │   │  payment_status      │  │
//! │  └─────────────────┘   └────────┬────────┘   └──────────────────────┘  │
//! │                                 │                                       │
//! │                       ┌─────────▼────────────┐                          │
//! │                       │ CustomerAccountEntry │  credit: cashback        │
//! │                       │ (account history)    │  debit: container charge │
//! │                       └──────────────────────┘                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Products, customers and orders belong to the host platform. The modules
//! only adjust stock, cost and account balance through the repositories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Rate
// =============================================================================

/// A percentage expressed in basis points (bps).
///
/// 1 bps = 0.01%, so 200 bps = 2% cashback and 500 bps = 5% discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Creates a rate from a percentage (for convenience).
    pub fn from_percentage(pct: f64) -> Self {
        Rate((pct * 100.0).round() as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate::zero()
    }
}

// =============================================================================
// Product
// =============================================================================

/// A host product. Components, finished goods and container-carrying items
/// are all products.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    /// Unit cost; written by the BOM cost sync for manufactured products.
    pub cost_cents: i64,
    pub current_stock: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }

    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Checks whether `quantity` units can be taken from stock.
    pub fn has_stock(&self, quantity: i64) -> bool {
        self.current_stock >= quantity
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A host customer.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    /// Member of the special-customer programme.
    pub is_special: bool,
    /// Store credit. Cashback credits it, container charges debit it.
    pub account_balance_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    #[inline]
    pub fn account_balance(&self) -> Money {
        Money::from_cents(self.account_balance_cents)
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Payment state of a host order. Only `Paid` orders count as purchases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    PartiallyPaid,
    Unpaid,
    Refunded,
}

/// A host sales order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub code: String,
    pub customer_id: Option<String>,
    pub total_cents: i64,
    pub payment_status: PaymentStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A line of a host order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

// =============================================================================
// Customer Account
// =============================================================================

/// Direction of a customer account change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AccountOperation {
    Credit,
    Debit,
}

impl AccountOperation {
    /// Signed effect of `amount` on the account balance.
    pub fn signed(&self, amount: Money) -> Money {
        match self {
            AccountOperation::Credit => amount,
            AccountOperation::Debit => -amount,
        }
    }
}

/// One row of customer account history.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CustomerAccountEntry {
    pub id: String,
    pub customer_id: String,
    pub operation: AccountOperation,
    pub amount_cents: i64,
    pub balance_after_cents: i64,
    /// ID of the module record that caused the change.
    pub reference: Option<String>,
    pub description: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_from_percentage() {
        let rate = Rate::from_percentage(2.5);
        assert_eq!(rate.bps(), 250);
        assert!((rate.percentage() - 2.5).abs() < 0.001);
    }

    #[test]
    fn test_account_operation_signed() {
        let amount = Money::from_cents(300);
        assert_eq!(AccountOperation::Credit.signed(amount).cents(), 300);
        assert_eq!(AccountOperation::Debit.signed(amount).cents(), -300);
    }

    #[test]
    fn test_payment_status_serde() {
        let json = serde_json::to_string(&PaymentStatus::PartiallyPaid).unwrap();
        assert_eq!(json, "\"partially_paid\"");
    }
}
