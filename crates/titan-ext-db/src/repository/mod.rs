//! # Repository Module
//!
//! One repository per table group. Each holds a clone of the pool; module
//! operations that touch several tables open a transaction and run every
//! statement on it.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Handler / hook dispatcher                                             │
//! │       │  db.containers().give(&input)                                  │
//! │       ▼                                                                 │
//! │  ContainerRepository                                                   │
//! │       │  BEGIN                                                          │
//! │       │  ├── load balance + inventory + settings                       │
//! │       │  ├── titan_ext_core::containers::LedgerTotals::apply           │
//! │       │  ├── INSERT movement, UPSERT balance, UPDATE inventory          │
//! │       │  └── customer account debit (charges)                          │
//! │       │  COMMIT                                                         │
//! │       ▼                                                                 │
//! │  SQLite                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - host products, stock, cost
//! - [`CustomerRepository`](customer::CustomerRepository) - host customers, account history
//! - [`OrderRepository`](order::OrderRepository) - host orders, yearly purchases
//! - [`SettingsRepository`](settings::SettingsRepository) - module options
//! - [`ContainerRepository`](container::ContainerRepository) - container deposit ledger
//! - [`BomRepository`](bom::BomRepository) - bills of materials
//! - [`ManufacturingOrderRepository`](manufacturing::ManufacturingOrderRepository) - production orders
//! - [`LoyaltyRepository`](loyalty::LoyaltyRepository) - special customers, cashback

pub mod bom;
pub mod container;
pub mod customer;
pub mod loyalty;
pub mod manufacturing;
pub mod order;
pub mod product;
pub mod settings;

#[cfg(test)]
pub(crate) mod fixtures {
    //! Shared setup for repository tests.

    use chrono::Utc;
    use titan_ext_core::{Customer, PaymentStatus, Product};

    use super::customer::NewCustomer;
    use super::order::{NewOrder, NewOrderLine};
    use super::product::NewProduct;
    use crate::{Database, DbConfig};

    pub async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub async fn product(db: &Database, sku: &str, cost_cents: i64, stock: i64) -> Product {
        db.products()
            .insert(&NewProduct {
                sku: sku.to_string(),
                name: sku.to_lowercase(),
                price_cents: cost_cents * 2,
                cost_cents,
                current_stock: stock,
            })
            .await
            .unwrap()
    }

    pub async fn customer(db: &Database, name: &str, is_special: bool) -> Customer {
        db.customers()
            .insert(&NewCustomer {
                name: name.to_string(),
                email: None,
                is_special,
            })
            .await
            .unwrap()
    }

    pub async fn paid_order(db: &Database, customer: &Customer, product: &Product, quantity: i64) {
        db.orders()
            .insert(&NewOrder {
                customer_id: Some(customer.id.clone()),
                payment_status: PaymentStatus::Paid,
                lines: vec![NewOrderLine {
                    product_id: product.id.clone(),
                    quantity,
                    unit_price_cents: product.price_cents,
                }],
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }
}
