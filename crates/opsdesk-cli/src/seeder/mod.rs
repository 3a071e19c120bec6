//! Database seeding module for populating test data.
//!
//! - [`principals`] - Manager and employee accounts
//! - [`customers`] - Customer generation and insertion
//! - [`vendors`] - Vendor generation and insertion
//! - [`contacts`] - Contact, address and financial fields shared by both
//! - [`models`] - Data structures for seeding configuration
//!
//! Every seeded row uses an `@example.com` address, which is how
//! [`clear_all`] finds them again. Seeded codes continue from the highest
//! existing code, including soft-deleted rows.
//!
//! # Performance
//!
//! - Parallel data generation using Rayon
//! - Batch inserts with multi-value INSERT statements
//! - Single bcrypt hash reused for all principals (cost 4 for speed)

pub mod contacts;
pub mod customers;
pub mod models;
pub mod principals;
pub mod vendors;

pub use models::{SeedConfig, StaffCounts};

use bcrypt::hash;
use sqlx::PgPool;
use std::time::Instant;

/// Password every seeded principal can log in with.
pub const SEED_PASSWORD: &str = "password123";

/// Seeds staff, customers and vendors. Customers and vendors are spread
/// across the seeded managers as account managers.
pub async fn seed_all(db: &PgPool, config: SeedConfig) -> Result<(), Box<dyn std::error::Error>> {
    let start_time = Instant::now();

    println!("🌱 Starting database seeding...");
    println!(
        "   - Principals: {} managers, {} employees",
        config.staff.managers, config.staff.employees
    );
    println!("   - Customers: {}", config.customers);
    println!("   - Vendors: {}", config.vendors);

    let password_hash = hash_password()?;

    let managers =
        principals::seed_staff(db, config.staff.managers, config.staff.employees, &password_hash)
            .await?;
    customers::seed_customers(db, config.customers, &managers).await?;
    vendors::seed_vendors(db, config.vendors, &managers).await?;

    println!(
        "\n✅ Seeding completed in {:?} ({} principals, {} customers, {} vendors)",
        start_time.elapsed(),
        config.total_principals(),
        config.customers,
        config.vendors
    );
    println!("   Seeded principals log in with password: {}", SEED_PASSWORD);
    Ok(())
}

/// Clears all seeded data from the database
pub async fn clear_all(db: &PgPool) -> Result<(), Box<dyn std::error::Error>> {
    let start_time = Instant::now();
    println!("🗑️  Clearing all seeded data...");

    customers::clear_customers(db).await?;
    vendors::clear_vendors(db).await?;
    principals::clear_staff(db).await?;

    println!("✅ All seeded data cleared in {:?}", start_time.elapsed());
    Ok(())
}

/// The number after the highest code in `table`, counting soft-deleted rows.
pub(crate) async fn next_code_number(
    db: &PgPool,
    table: &str,
    column: &str,
) -> Result<u32, Box<dyn std::error::Error>> {
    let query = format!(
        "SELECT COALESCE(MAX(SUBSTRING({0} FROM 5)::INTEGER), 0) FROM {1} WHERE {0} ~ '^[A-Z]{{4}}[0-9]{{6}}$'",
        column, table
    );
    let highest: i32 = sqlx::query_scalar(&query).fetch_one(db).await?;
    Ok(highest as u32 + 1)
}

fn hash_password() -> Result<String, Box<dyn std::error::Error>> {
    println!("🔐 Hashing password...");
    let start = Instant::now();
    let hashed = hash(SEED_PASSWORD, 4)?;
    println!("   ✓ Password hashed in {:?}", start.elapsed());
    Ok(hashed)
}
