//! # Seed Data Generator
//!
//! Populates the database with a realistic pharmacy catalog and
//! purchase history for development.
//!
//! ## Usage
//! ```bash
//! # Seed with defaults
//! cargo run -p medstock-db --bin seed
//!
//! # Specify database path
//! cargo run -p medstock-db --bin seed -- --db ./data/medstock.db
//!
//! # More purchase history per medicine
//! cargo run -p medstock-db --bin seed -- --batches 5
//! ```
//!
//! ## Generated Data
//! - A formulary of common medicines (analgesics, antibiotics,
//!   antacids, antihistamines) with default prices and thresholds
//! - Three suppliers and a handful of patients
//! - Dated purchase history per medicine, so FIFO behavior is
//!   immediately visible when dispensing from the seeded database

use std::env;

use chrono::{Duration, Utc};
use medstock_core::Actor;
use medstock_db::{Database, DbConfig, NewMedicine, NewPurchase};

/// (name, generic, form, strength, price cents, low-stock threshold)
const MEDICINES: &[(&str, &str, &str, &str, i64, i64)] = &[
    ("Paracetamol 500mg", "Paracetamol", "tablet", "500 mg", 300, 50),
    ("Ibuprofen 400mg", "Ibuprofen", "tablet", "400 mg", 450, 40),
    ("Aspirin 75mg", "Acetylsalicylic acid", "tablet", "75 mg", 250, 40),
    ("Amoxicillin 250mg", "Amoxicillin", "capsule", "250 mg", 900, 30),
    ("Amoxicillin 500mg", "Amoxicillin", "capsule", "500 mg", 1400, 30),
    ("Azithromycin 500mg", "Azithromycin", "tablet", "500 mg", 2200, 20),
    ("Ciprofloxacin 500mg", "Ciprofloxacin", "tablet", "500 mg", 1800, 20),
    ("Omeprazole 20mg", "Omeprazole", "capsule", "20 mg", 800, 30),
    ("Ranitidine 150mg", "Ranitidine", "tablet", "150 mg", 600, 30),
    ("Cetirizine 10mg", "Cetirizine", "tablet", "10 mg", 400, 25),
    ("Loratadine 10mg", "Loratadine", "tablet", "10 mg", 500, 25),
    ("Metformin 500mg", "Metformin", "tablet", "500 mg", 550, 60),
    ("Amlodipine 5mg", "Amlodipine", "tablet", "5 mg", 700, 40),
    ("Salbutamol Syrup", "Salbutamol", "syrup", "2 mg/5 ml", 1200, 15),
    ("ORS Sachet", "Oral rehydration salts", "powder", "20.5 g", 150, 100),
];

const SUPPLIERS: &[&str] = &[
    "HealthSupply Distributors",
    "PharmaDirect Ltd",
    "MediSource Trading",
];

const PATIENTS: &[&str] = &[
    "Aisha Khan",
    "Bilal Ahmed",
    "Fatima Noor",
    "Hassan Raza",
    "Sana Malik",
    "Usman Tariq",
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./medstock_dev.db");
    let mut batches_per_medicine: usize = 3;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--batches" | "-b" => {
                if i + 1 < args.len() {
                    batches_per_medicine = args[i + 1].parse().unwrap_or(3);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("MedStock Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>      Database file path (default: ./medstock_dev.db)");
                println!("  -b, --batches <N>    Purchase batches per medicine (default: 3)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 MedStock Seed Data Generator");
    println!("===============================");
    println!("Database: {}", db_path);
    println!("Batches per medicine: {}", batches_per_medicine);
    println!();

    // Connect to database
    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Skip if already seeded
    let existing = db
        .purchases()
        .list_purchases(&Default::default(), Default::default())
        .await?;
    if existing.total > 0 {
        println!("⚠ Database already has {} stock batches", existing.total);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let catalog = db.catalog();
    let actor = Actor::new("seed-staff", "seed-user");
    let start = std::time::Instant::now();

    println!();
    println!("Creating suppliers and patients...");
    let mut supplier_ids = Vec::new();
    for name in SUPPLIERS {
        supplier_ids.push(catalog.insert_supplier(name).await?);
    }
    for name in PATIENTS {
        catalog.insert_patient(name).await?;
    }

    println!("Creating medicines with purchase history...");
    let today = Utc::now().date_naive();
    let mut batch_count = 0;

    for (idx, (name, generic, form, strength, price, threshold)) in MEDICINES.iter().enumerate() {
        let medicine = catalog
            .insert_medicine(NewMedicine {
                name: name.to_string(),
                generic_name: Some(generic.to_string()),
                dosage_form: Some(form.to_string()),
                strength: Some(strength.to_string()),
                unit_price_cents: *price,
                low_stock_threshold: *threshold,
            })
            .await?;

        // Oldest batch first so the database carries real FIFO depth.
        for b in 0..batches_per_medicine {
            let age_days = ((batches_per_medicine - b) * 30) as i64;
            let purchase_date = today - Duration::days(age_days);
            let supplier_id = &supplier_ids[(idx + b) % supplier_ids.len()];

            db.purchases()
                .record_purchase(
                    &actor,
                    NewPurchase {
                        medicine_id: medicine.id.clone(),
                        supplier_id: supplier_id.clone(),
                        invoice_number: format!("SEED-{:03}-{:02}", idx, b),
                        batch_number: Some(format!("LOT{}{:02}", idx, b)),
                        quantity: 100 + (idx as i64 * 13 + b as i64 * 37) % 150,
                        // Cost 55-75% of the sale price
                        unit_cost_cents: (*price * (55 + ((idx + b) % 20) as i64)) / 100,
                        purchase_date: Some(purchase_date),
                        expiry_date: Some(purchase_date + Duration::days(365)),
                    },
                )
                .await?;
            batch_count += 1;
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!(
        "✓ Seeded {} medicines, {} suppliers, {} patients, {} batches in {:?}",
        MEDICINES.len(),
        SUPPLIERS.len(),
        PATIENTS.len(),
        batch_count,
        elapsed
    );

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
