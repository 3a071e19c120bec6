//! Vendor seeding.

use fake::Fake;
use fake::faker::company::en::CompanyName;
use opsdesk_models::{PrincipalId, VENDOR_CODE_PREFIX, VendorPriority, VendorStatus};
use rayon::prelude::*;
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Instant;

use super::contacts::generate_contact;
use super::models::VendorSeed;
use super::next_code_number;

const BATCH_SIZE: usize = 1000;

const SERVICE_CATEGORIES: &[&str] = &[
    "Logistics",
    "Facilities",
    "IT Services",
    "Office Supplies",
    "Consulting",
    "Marketing",
    "Legal",
    "Catering",
];

/// Generates vendors in parallel. Codes continue from `first_number`.
pub fn generate_vendors(
    count: usize,
    first_number: u32,
    managers: &[PrincipalId],
) -> Vec<VendorSeed> {
    (0..count)
        .into_par_iter()
        .map(|idx| {
            let number = first_number + idx as u32;
            VendorSeed {
                code: format!("{}{:06}", VENDOR_CODE_PREFIX, number),
                service_category: SERVICE_CATEGORIES[idx % SERVICE_CATEGORIES.len()].to_string(),
                // Derived from the code so seeded tax ids never collide.
                tax_id: format!("TX-{:09}", number),
                status: VendorStatus::ALL[(0..VendorStatus::ALL.len()).fake::<usize>()],
                priority: VendorPriority::ALL[(0..VendorPriority::ALL.len()).fake::<usize>()],
                contact: generate_contact(CompanyName().fake(), "vend", idx, managers),
            }
        })
        .collect()
}

pub async fn seed_vendors(
    db: &PgPool,
    count: usize,
    managers: &[PrincipalId],
) -> Result<u64, Box<dyn std::error::Error>> {
    let start_time = Instant::now();
    println!("🚚 Seeding {} vendors...", count);

    let first_number = next_code_number(db, "vendors", "vendor_code").await?;
    let vendors = generate_vendors(count, first_number, managers);

    let mut tx = db.begin().await?;
    let mut inserted = 0;
    for chunk in vendors.chunks(BATCH_SIZE) {
        inserted += insert_vendors_chunk(&mut tx, chunk).await?;
    }
    tx.commit().await?;

    println!(
        "   ✓ Inserted {} vendors in {:?}",
        inserted,
        start_time.elapsed()
    );
    Ok(inserted)
}

async fn insert_vendors_chunk(
    tx: &mut Transaction<'_, Postgres>,
    vendors: &[VendorSeed],
) -> Result<u64, Box<dyn std::error::Error>> {
    if vendors.is_empty() {
        return Ok(0);
    }

    let mut query = String::from(
        "INSERT INTO vendors (vendor_code, name, service_category, tax_id, status, priority, \
         email, phone, address_line1, city, postal_code, country, credit_limit, \
         outstanding_balance, payment_terms, first_contact_date, last_contact_date, \
         contract_start_date, tags, account_manager_id, created_by) VALUES ",
    );
    for i in 0..vendors.len() {
        if i > 0 {
            query.push_str(", ");
        }
        let placeholders: Vec<String> = (1..=21).map(|n| format!("${}", i * 21 + n)).collect();
        query.push_str(&format!("({})", placeholders.join(", ")));
    }

    let mut q = sqlx::query(&query);
    for vendor in vendors {
        let c = &vendor.contact;
        q = q
            .bind(&vendor.code)
            .bind(&c.name)
            .bind(&vendor.service_category)
            .bind(&vendor.tax_id)
            .bind(vendor.status)
            .bind(vendor.priority)
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

/// Hard-deletes seeded vendors.
pub async fn clear_vendors(db: &PgPool) -> Result<u64, Box<dyn std::error::Error>> {
    let deleted = sqlx::query("DELETE FROM vendors WHERE email LIKE '%@example.com'")
        .execute(db)
        .await?
        .rows_affected();
    println!("   ✓ Deleted {} vendors", deleted);
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_ids_follow_codes() {
        let vendors = generate_vendors(2, 7, &[]);
        assert_eq!(vendors[0].code, "VEND000007");
        assert_eq!(vendors[1].tax_id, "TX-000000008");
    }
}
