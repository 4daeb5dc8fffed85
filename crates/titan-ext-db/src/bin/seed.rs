//! # Seed Data Generator
//!
//! Populates a development database with enough host data to exercise
//! every extension module.
//!
//! ## Usage
//! ```bash
//! # Seed ./titan_ext_dev.db
//! cargo run -p titan-ext-db --bin seed
//!
//! # Specify database path and number of customers
//! cargo run -p titan-ext-db --bin seed -- --db ./data/ext.db --customers 50
//! ```
//!
//! ## Generated Data
//! - Beverages sold in returnable crates, linked to a "Beer crate" type
//! - Bakery components and a "Bread" BOM (flour, water, salt, yeast)
//! - Customers, every third one special
//! - Paid orders spread over the current and previous year
//! - Containers given for this year's orders

use chrono::{Datelike, Duration, Utc};
use std::env;
use titan_ext_core::containers::NewContainerType;
use titan_ext_core::hooks::OrderLine;
use titan_ext_core::manufacturing::{NewBom, NewBomItem};
use titan_ext_core::{PaymentStatus, Product};
use titan_ext_db::{
    Database, DbConfig, NewCustomer, NewOrder, NewOrderLine, NewProduct,
};

/// Crate-packed beverages: (sku, name, price cents)
const BEVERAGES: &[(&str, &str, i64)] = &[
    ("BEV-PILS-24", "Pilsner 24 x 0.33L", 2_499),
    ("BEV-LAGER-20", "Lager 20 x 0.5L", 2_299),
    ("BEV-WATER-12", "Mineral Water 12 x 0.7L", 899),
    ("BEV-COLA-12", "Cola 12 x 1L", 1_499),
];

/// Bread components: (sku, name, cost cents, stock, qty per loaf)
const BAKERY: &[(&str, &str, i64, i64, i64)] = &[
    ("GRO-FLOUR", "Flour 1kg", 120, 200, 1),
    ("GRO-WATER", "Water 1L", 10, 500, 1),
    ("GRO-SALT", "Salt 10g", 2, 1_000, 2),
    ("GRO-YEAST", "Yeast 7g", 25, 300, 1),
];

const FIRST_NAMES: &[&str] = &[
    "Amira", "Bilal", "Chen", "Dana", "Emil", "Farah", "Goran", "Hina", "Ivo", "Jana",
];

const LAST_NAMES: &[&str] = &["Khan", "Novak", "Silva", "Okafor", "Larsen", "Haddad"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut customers: usize = 20;
    let mut db_path = String::from("./titan_ext_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--customers" | "-c" => {
                if i + 1 < args.len() {
                    customers = args[i + 1].parse().unwrap_or(20);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Titan Extensions Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --customers <N>  Number of customers to generate (default: 20)");
                println!("  -d, --db <PATH>      Database file path (default: ./titan_ext_dev.db)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Titan Extensions Seed Data Generator");
    println!("======================================");
    println!("Database:  {}", db_path);
    println!("Customers: {}", customers);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();

    // Products
    let mut beverages: Vec<Product> = Vec::new();
    for (sku, name, price_cents) in BEVERAGES {
        let product = db
            .products()
            .insert(&NewProduct {
                sku: sku.to_string(),
                name: name.to_string(),
                price_cents: *price_cents,
                cost_cents: price_cents * 70 / 100,
                current_stock: 100,
            })
            .await?;
        beverages.push(product);
    }
    println!("✓ {} beverages", beverages.len());

    // Containers
    let beer_crate = db
        .containers()
        .create_type(&NewContainerType {
            name: "Beer crate".to_string(),
            capacity_ml: Some(12_000),
            deposit_fee_cents: 150,
        })
        .await?;
    db.containers()
        .adjust_inventory(&beer_crate.id, 500, Some("Opening stock"))
        .await?;
    for product in &beverages {
        db.containers()
            .link_product(&product.id, &beer_crate.id, 1)
            .await?;
    }
    println!("✓ Container type '{}' linked to beverages", beer_crate.name);

    // Manufacturing
    let bread = db
        .products()
        .insert(&NewProduct {
            sku: "BAK-BREAD".to_string(),
            name: "Farmhouse Bread".to_string(),
            price_cents: 399,
            cost_cents: 0,
            current_stock: 0,
        })
        .await?;

    let mut items = Vec::new();
    for (sku, name, cost_cents, stock, per_loaf) in BAKERY {
        let component = db
            .products()
            .insert(&NewProduct {
                sku: sku.to_string(),
                name: name.to_string(),
                price_cents: cost_cents * 2,
                cost_cents: *cost_cents,
                current_stock: *stock,
            })
            .await?;
        items.push(NewBomItem {
            component_product_id: component.id,
            quantity: *per_loaf,
        });
    }

    let bom = db
        .boms()
        .create_bom(&NewBom {
            product_id: bread.id.clone(),
            name: "Farmhouse Bread".to_string(),
            description: Some("One loaf".to_string()),
            items,
        })
        .await?;
    db.boms().sync_product_cost(&bom.bom.id).await?;
    println!("✓ BOM '{}' costs {} per loaf", bom.bom.name, bom.cost.total());

    // Customers and orders
    let now = Utc::now();
    let mut orders = 0;
    let mut containers_given = 0;

    for n in 0..customers {
        let name = format!(
            "{} {}",
            FIRST_NAMES[n % FIRST_NAMES.len()],
            LAST_NAMES[n % LAST_NAMES.len()]
        );
        let customer = db
            .customers()
            .insert(&NewCustomer {
                email: Some(format!("customer{}@example.com", n + 1)),
                name,
                is_special: n % 3 == 0,
            })
            .await?;

        for k in 0..(1 + n % 4) {
            let product = &beverages[(n + k) % beverages.len()];
            let quantity = 1 + ((n + k) % 3) as i64;
            // Alternate between this year and last year
            let created_at = now - Duration::days(((n * 37 + k * 91) % 400) as i64);

            let order = db
                .orders()
                .insert(&NewOrder {
                    customer_id: Some(customer.id.clone()),
                    payment_status: PaymentStatus::Paid,
                    lines: vec![NewOrderLine {
                        product_id: product.id.clone(),
                        quantity,
                        unit_price_cents: product.price_cents,
                    }],
                    created_at,
                })
                .await?;
            orders += 1;

            if created_at.year() == now.year() {
                let given = db
                    .containers()
                    .give_for_order(
                        &order.id,
                        Some(&customer.id),
                        &[OrderLine {
                            product_id: product.id.clone(),
                            quantity,
                        }],
                    )
                    .await?;
                containers_given += given.iter().map(|m| m.quantity).sum::<i64>();
            }
        }
    }
    println!("✓ {} customers, {} paid orders", customers, orders);
    println!("✓ {} crates out with customers", containers_given);

    let elapsed = start.elapsed();
    println!();
    println!("✓ Seed complete in {:?}", elapsed);

    Ok(())
}
