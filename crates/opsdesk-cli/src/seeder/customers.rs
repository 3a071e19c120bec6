//! Customer seeding.

use fake::Fake;
use fake::faker::company::en::{CompanyName, Industry};
use fake::faker::name::en::Name;
use opsdesk_models::{
    CUSTOMER_CODE_PREFIX, CustomerPriority, CustomerStatus, CustomerType, PrincipalId,
};
use rayon::prelude::*;
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Instant;

use super::contacts::generate_contact;
use super::models::CustomerSeed;
use super::next_code_number;

// 21 bind parameters per row keeps a chunk well under the Postgres limit.
const BATCH_SIZE: usize = 1000;

/// Generates customers in parallel. Codes continue from `first_number`.
pub fn generate_customers(
    count: usize,
    first_number: u32,
    managers: &[PrincipalId],
) -> Vec<CustomerSeed> {
    (0..count)
        .into_par_iter()
        .map(|idx| {
            let customer_type = CustomerType::ALL[idx % CustomerType::ALL.len()];
            let name: String = match customer_type {
                CustomerType::Individual => Name().fake(),
                CustomerType::Business => CompanyName().fake(),
            };
            CustomerSeed {
                code: format!("{}{:06}", CUSTOMER_CODE_PREFIX, first_number + idx as u32),
                customer_type,
                industry: Industry().fake(),
                status: CustomerStatus::ALL[(0..CustomerStatus::ALL.len()).fake::<usize>()],
                priority: CustomerPriority::ALL[(0..CustomerPriority::ALL.len()).fake::<usize>()],
                contact: generate_contact(name, "cust", idx, managers),
            }
        })
        .collect()
}

pub async fn seed_customers(
    db: &PgPool,
    count: usize,
    managers: &[PrincipalId],
) -> Result<u64, Box<dyn std::error::Error>> {
    let start_time = Instant::now();
    println!("🏢 Seeding {} customers...", count);

    let first_number = next_code_number(db, "customers", "customer_code").await?;
    let customers = generate_customers(count, first_number, managers);

    let mut tx = db.begin().await?;
    let mut inserted = 0;
    for chunk in customers.chunks(BATCH_SIZE) {
        inserted += insert_customers_chunk(&mut tx, chunk).await?;
    }
    tx.commit().await?;

    println!(
        "   ✓ Inserted {} customers in {:?}",
        inserted,
        start_time.elapsed()
    );
    Ok(inserted)
}

async fn insert_customers_chunk(
    tx: &mut Transaction<'_, Postgres>,
    customers: &[CustomerSeed],
) -> Result<u64, Box<dyn std::error::Error>> {
    if customers.is_empty() {
        return Ok(0);
    }

    let mut query = String::from(
        "INSERT INTO customers (customer_code, name, customer_type, industry, status, priority, \
         email, phone, address_line1, city, postal_code, country, credit_limit, \
         outstanding_balance, payment_terms, first_contact_date, last_contact_date, \
         contract_start_date, tags, account_manager_id, created_by) VALUES ",
    );
    for i in 0..customers.len() {
        if i > 0 {
            query.push_str(", ");
        }
        let placeholders: Vec<String> = (1..=21).map(|n| format!("${}", i * 21 + n)).collect();
        query.push_str(&format!("({})", placeholders.join(", ")));
    }

    let mut q = sqlx::query(&query);
    for customer in customers {
        let c = &customer.contact;
        q = q
            .bind(&customer.code)
            .bind(&c.name)
            .bind(customer.customer_type)
            .bind(&customer.industry)
            .bind(customer.status)
            .bind(customer.priority)
            .bind(&c.email)
            .bind(&c.phone)
            .bind(&c.address_line1)
            .bind(&c.city)
            .bind(&c.postal_code)
            .bind(&c.country)
            .bind(c.credit_limit)
            .bind(c.outstanding_balance)
            .bind(c.payment_terms)
            .bind(c.first_contact_date)
            .bind(c.last_contact_date)
            .bind(c.contract_start_date)
            .bind(&c.tags)
            .bind(c.account_manager_id)
            .bind(c.account_manager_id);
    }

    Ok(q.execute(&mut **tx).await?.rows_affected())
}

/// Hard-deletes seeded customers.
pub async fn clear_customers(db: &PgPool) -> Result<u64, Box<dyn std::error::Error>> {
    let deleted = sqlx::query("DELETE FROM customers WHERE email LIKE '%@example.com'")
        .execute(db)
        .await?
        .rows_affected();
    println!("   ✓ Deleted {} customers", deleted);
    Ok(deleted)
}
