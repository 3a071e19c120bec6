//! Staff principal seeding.

use fake::Fake;
use fake::faker::name::en::*;
use opsdesk_models::{PrincipalId, Role};
use rayon::prelude::*;
use sqlx::PgPool;
use std::time::Instant;

use super::models::PrincipalSeed;

/// Generates managers and employees in parallel.
pub fn generate_staff(managers: usize, employees: usize, password_hash: &str) -> Vec<PrincipalSeed> {
    let roles: Vec<(Role, usize)> = (0..managers)
        .map(|i| (Role::Manager, i))
        .chain((0..employees).map(|i| (Role::Employee, i)))
        .collect();

    roles
        .par_iter()
        .map(|&(role, idx)| {
            let first_name: String = FirstName().fake();
            let last_name: String = LastName().fake();
            PrincipalSeed {
                email: format!(
                    "{}.{}+{}{}@example.com",
                    first_name.to_lowercase(),
                    last_name.to_lowercase(),
                    role.as_str(),
                    idx
                ),
                name: format!("{} {}", first_name, last_name),
                password_hash: password_hash.to_string(),
                role,
            }
        })
        .collect()
}

/// Seeds staff principals, returning the managers' ids for account assignment.
pub async fn seed_staff(
    db: &PgPool,
    managers: usize,
    employees: usize,
    password_hash: &str,
) -> Result<Vec<PrincipalId>, Box<dyn std::error::Error>> {
    let start_time = Instant::now();
    println!(
        "👥 Seeding {} principals ({} managers, {} employees)...",
        managers + employees,
        managers,
        employees
    );

    let staff = generate_staff(managers, employees, password_hash);
    let inserted = insert_principals_batch(db, &staff).await?;

    println!(
        "   ✓ Inserted {} principals in {:?}",
        inserted.len(),
        start_time.elapsed()
    );

    Ok(inserted
        .into_iter()
        .filter(|(_, role)| *role == Role::Manager)
        .map(|(id, _)| id)
        .collect())
}

async fn insert_principals_batch(
    db: &PgPool,
    principals: &[PrincipalSeed],
) -> Result<Vec<(PrincipalId, Role)>, Box<dyn std::error::Error>> {
    if principals.is_empty() {
        return Ok(Vec::new());
    }

    let mut query =
        String::from("INSERT INTO principals (name, email, password_hash, role) VALUES ");
    for i in 0..principals.len() {
        if i > 0 {
            query.push_str(", ");
        }
        let p = i * 4;
        query.push_str(&format!("(${}, ${}, ${}, ${})", p + 1, p + 2, p + 3, p + 4));
    }
    query.push_str(" ON CONFLICT (email) DO NOTHING RETURNING id, role");

    let mut q = sqlx::query_as::<_, (PrincipalId, Role)>(&query);
    for principal in principals {
        q = q
            .bind(&principal.name)
            .bind(&principal.email)
            .bind(&principal.password_hash)
            .bind(principal.role);
    }

    Ok(q.fetch_all(db).await?)
}

/// Removes seeded principals. Admins are never touched.
pub async fn clear_staff(db: &PgPool) -> Result<u64, Box<dyn std::error::Error>> {
    let start_time = Instant::now();
    println!("🗑️  Clearing seeded principals...");

    let deleted = sqlx::query(
        "DELETE FROM principals WHERE email LIKE '%@example.com' AND role <> 'admin'",
    )
    .execute(db)
    .await?
    .rows_affected();

    println!("   ✓ Deleted {} principals in {:?}", deleted, start_time.elapsed());
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_staff_counts_and_emails() {
        let staff = generate_staff(2, 3, "hash");
        assert_eq!(staff.len(), 5);
        assert_eq!(staff.iter().filter(|p| p.role == Role::Manager).count(), 2);
        assert!(staff.iter().all(|p| p.email.ends_with("@example.com")));
    }
}
