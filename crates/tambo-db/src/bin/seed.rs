//! # Seed Data Generator
//!
//! Fills a development database with a small Peruvian kiosk catalog and a
//! couple of operators.
//!
//! ## Usage
//! ```bash
//! cargo run -p tambo-db --bin seed
//! cargo run -p tambo-db --bin seed -- --db ./data/tambo.db
//! ```

use std::env;

use anyhow::{Context, Result};
use chrono::Utc;
use tambo_core::{Operator, OperatorRole, Product};
use tambo_db::{Database, DbConfig};
use uuid::Uuid;

/// (category, [(name, price in céntimos)])
const CATALOG: &[(&str, &[(&str, i64)])] = &[
    (
        "Bebidas",
        &[
            ("Chicha morada", 500),
            ("Inca Kola 500ml", 350),
            ("Emoliente", 200),
            ("Cafe pasado", 400),
            ("Agua San Luis", 250),
            ("Maracuya frozen", 700),
        ],
    ),
    (
        "Comidas",
        &[
            ("Empanada de carne", 700),
            ("Papa rellena", 600),
            ("Anticucho", 1200),
            ("Tamal", 800),
            ("Pan con chicharron", 1000),
            ("Causa limena", 900),
        ],
    ),
    (
        "Dulces",
        &[
            ("Picarones", 800),
            ("Turron de Dona Pepa", 800),
            ("Alfajor", 300),
            ("Mazamorra morada", 500),
            ("Arroz con leche", 500),
        ],
    ),
];

const OPERATORS: &[(&str, &str, OperatorRole)] = &[
    ("admin", "Administrador", OperatorRole::Admin),
    ("cajero-1", "Rosa", OperatorRole::Cashier),
    ("cajero-2", "Miguel", OperatorRole::Cashier),
];

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./tambo_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if let Some(path) = args.get(i + 1) {
                    db_path = path.clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tambo POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./tambo_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => eprintln!("Ignoring unknown argument: {}", other),
        }
        i += 1;
    }

    println!("🌱 Tambo POS Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path))
        .await
        .with_context(|| format!("opening {}", db_path))?;
    println!("✓ Connected, migrations applied");

    for (id, name, role) in OPERATORS {
        db.operators()
            .upsert(&Operator {
                id: id.to_string(),
                display_name: name.to_string(),
                role: *role,
                is_active: true,
            })
            .await
            .with_context(|| format!("upserting operator {}", id))?;
    }
    println!("✓ {} operators", OPERATORS.len());

    let existing = db.products().count_active().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products, skipping catalog", existing);
        return Ok(());
    }

    let now = Utc::now();
    let mut generated = 0;
    for (category, items) in CATALOG {
        for (name, price_cents) in *items {
            let product = Product {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                price_cents: *price_cents,
                category: Some(category.to_string()),
                is_active: true,
                created_at: now,
                updated_at: now,
            };
            db.products()
                .insert(&product)
                .await
                .with_context(|| format!("inserting {}", name))?;
            generated += 1;
        }
    }

    println!("✓ {} products", generated);
    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}
