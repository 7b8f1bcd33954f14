//! # Seed Data Generator
//!
//! Populates a database with demo customers, products and invoices for
//! development.
//!
//! ## Usage
//! ```bash
//! # 200 products, 30 customers, 100 invoices (default)
//! cargo run -p khalifa-db --bin seed
//!
//! # Custom amount of products
//! cargo run -p khalifa-db --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p khalifa-db --bin seed -- --db ./data/khalifa.db
//! ```
//!
//! ## Generated Data
//! - Products across household categories, SKU `{CATEGORY}-{INDEX}`
//! - Customers with Egyptian mobile numbers
//! - Invoices spread over the last 120 days, some paid, some partially

use chrono::{Duration, Utc};
use std::env;
use tracing_subscriber::EnvFilter;

use khalifa_core::{CustomerInput, InvoiceDraft, Money, PaymentMethod, Product, ProductInput, Rate};
use khalifa_db::{Database, DbConfig};

/// Product categories for demo data
const CATEGORIES: &[(&str, &str, &[&str])] = &[
    (
        "KIT",
        "أدوات مطبخ",
        &["Tea Cup", "Coffee Mug", "Saucepan", "Frying Pan", "Knife Set", "Cutting Board", "Kettle", "Strainer"],
    ),
    (
        "TBL",
        "أدوات مائدة",
        &["Dinner Plate", "Soup Bowl", "Glass Set", "Serving Tray", "Spoon Set", "Fork Set", "Jug", "Napkin Holder"],
    ),
    (
        "CLN",
        "منظفات",
        &["Dish Soap", "Floor Cleaner", "Sponge Pack", "Broom", "Mop", "Bleach", "Glass Cleaner", "Trash Bags"],
    ),
    (
        "HOM",
        "مفروشات",
        &["Bath Towel", "Hand Towel", "Bed Sheet", "Pillow Case", "Blanket", "Table Cloth", "Curtain", "Rug"],
    ),
];

/// Customer names for demo data
const CUSTOMERS: &[&str] = &[
    "أحمد علي", "محمد حسن", "منى عادل", "سارة محمود", "عمر سعيد", "هدى كمال", "كريم نبيل",
    "ياسمين فؤاد", "مصطفى إبراهيم", "نورا سامي", "خالد عبد الله", "رنا جمال", "طارق شوقي",
    "دينا رأفت", "حسام الدين", "ليلى مراد",
];

/// Discount rates in basis points
const DISCOUNTS: &[u32] = &[0, 0, 0, 500, 1000];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,khalifa_db=debug,khalifa_export=debug,sqlx=warn")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut customers: usize = 30;
    let mut invoices: usize = 100;
    let mut db_path = String::from("./khalifa_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(count);
                    i += 1;
                }
            }
            "--customers" => {
                if i + 1 < args.len() {
                    customers = args[i + 1].parse().unwrap_or(customers);
                    i += 1;
                }
            }
            "--invoices" => {
                if i + 1 < args.len() {
                    invoices = args[i + 1].parse().unwrap_or(invoices);
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
                println!("Khalifa Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>      Number of products to generate (default: 200)");
                println!("      --customers <N>  Number of customers (default: 30)");
                println!("      --invoices <N>   Number of invoices (default: 100)");
                println!("  -d, --db <PATH>      Database file path (default: ./khalifa_dev.db)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Khalifa Seed Data Generator");
    println!("===========================");
    println!("Database:  {}", db_path);
    println!("Products:  {}", count);
    println!("Customers: {}", customers);
    println!("Invoices:  {}", invoices);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        db.close().await;
        return Ok(());
    }

    // Products
    let start = std::time::Instant::now();
    let mut products: Vec<Product> = Vec::with_capacity(count);
    'outer: for round in 0..=count {
        for (category_idx, (code, category, names)) in CATEGORIES.iter().enumerate() {
            for (name_idx, name) in names.iter().enumerate() {
                if products.len() >= count {
                    break 'outer;
                }
                let seed = round * 100 + category_idx * 10 + name_idx;
                let input = generate_product(code, category, name, round, seed);
                match db.products().create(input).await {
                    Ok(product) => products.push(product),
                    Err(e) => eprintln!("Failed to insert product {}: {}", seed, e),
                }
            }
        }
    }
    println!("✓ Generated {} products", products.len());

    // Customers
    let mut customer_ids = Vec::with_capacity(customers);
    for index in 0..customers {
        let name = CUSTOMERS[index % CUSTOMERS.len()];
        let input = CustomerInput {
            name: if index < CUSTOMERS.len() {
                name.to_string()
            } else {
                format!("{} {}", name, index / CUSTOMERS.len() + 1)
            },
            phone: format!("010{:08}", 10_000_000 + index),
            ..Default::default()
        };
        match db.customers().create(input).await {
            Ok(customer) => customer_ids.push(customer.id),
            Err(e) => eprintln!("Failed to insert customer {}: {}", index, e),
        }
    }
    println!("✓ Generated {} customers", customer_ids.len());

    // Invoices
    let today = Utc::now().date_naive();
    let mut created = 0;
    let mut warnings = 0;
    if !products.is_empty() && !customer_ids.is_empty() {
        for index in 0..invoices {
            let customer_id = &customer_ids[(index * 7) % customer_ids.len()];
            let date = today - Duration::days(((index * 13) % 120) as i64);

            let mut draft = InvoiceDraft::for_customer(customer_id.as_str(), date);
            for line in 0..(1 + index % 4) {
                let product = &products[(index * 11 + line * 5) % products.len()];
                draft.add_product(product, 1 + ((index + line) % 3) as i64)?;
            }
            draft.set_discount(Rate::from_bps(DISCOUNTS[index % DISCOUNTS.len()]))?;

            // Every third invoice paid in full, every third partially.
            let total = draft.totals().total;
            let paid = match index % 3 {
                0 => Some(total),
                1 => Some(Money::from_minor(total.minor() / 2)),
                _ => None,
            };
            draft.set_initial_payment(paid, PaymentMethod::Cash);

            match db.invoices().create(&draft.finalize()?).await {
                Ok(result) => {
                    created += 1;
                    warnings += result.warnings.len();
                }
                Err(e) => eprintln!("Failed to create invoice {}: {}", index, e),
            }
        }
    }
    println!("✓ Generated {} invoices ({} stock warnings)", created, warnings);

    let elapsed = start.elapsed();
    println!();
    println!("✓ Seed complete in {:?}", elapsed);
    println!("  Low stock:    {}", db.products().low_stock().await?.len());
    println!("  Out of stock: {}", db.products().out_of_stock().await?.len());
    println!("  Debtors:      {}", db.customers().debtors().await?.len());

    db.close().await;
    Ok(())
}

/// Generates a single product with plausible data.
fn generate_product(code: &str, category: &str, name: &str, round: usize, seed: usize) -> ProductInput {
    // Price: 15.00 - 414.00 EGP
    let price_minor = 1_500 + ((seed * 37) % 400) as i64 * 100;

    // Cost: 60-80% of price
    let cost_pct = 60 + (seed % 20) as i64;

    let full_name = if round == 0 {
        name.to_string()
    } else {
        format!("{} #{}", name, round + 1)
    };

    ProductInput {
        sku: format!("{}-{:04}", code, seed),
        name: full_name,
        category: Some(category.to_string()),
        description: None,
        price: Money::from_minor(price_minor),
        cost_price: Money::from_minor(price_minor * cost_pct / 100),
        opening_stock: (seed % 41) as i64,
        min_stock: 5 + (seed % 3) as i64 * 5,
    }
}
