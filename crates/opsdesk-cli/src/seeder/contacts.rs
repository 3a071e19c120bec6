//! Contact, address and financial fields shared by seeded customers and vendors.
//!
//! Generated records always satisfy the cross-field business rules, so a
//! seeded record can be re-saved through the API unchanged.

use chrono::{Days, Utc};
use fake::Fake;
use fake::faker::address::en::*;
use fake::faker::lorem::en::Words;
use opsdesk_models::PrincipalId;
use rust_decimal::Decimal;

use super::models::ContactSeed;

pub fn generate_contact(
    name: String,
    email_tag: &str,
    idx: usize,
    managers: &[PrincipalId],
) -> ContactSeed {
    let today = Utc::now().date_naive();
    let first_contact = today - Days::new((400..1500).fake::<u64>());
    let contract_start = first_contact + Days::new((0..90).fake::<u64>());
    let last_contact = today - Days::new((0..60).fake::<u64>());

    let credit_cents: i64 = (100_000..10_000_000).fake();
    let balance_cents: i64 = (0..=credit_cents).fake();

    let mut slug: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(16)
        .collect::<String>()
        .to_lowercase();
    if slug.is_empty() {
        slug.push_str("contact");
    }

    ContactSeed {
        email: format!("{}+{}{}@example.com", slug, email_tag, idx),
        phone: format!("+1{}", (2_000_000_000u64..9_999_999_999).fake::<u64>()),
        address_line1: format!(
            "{} {}",
            BuildingNumber().fake::<String>(),
            StreetName().fake::<String>()
        ),
        city: CityName().fake(),
        postal_code: ZipCode().fake(),
        country: CountryName().fake(),
        credit_limit: Decimal::new(credit_cents, 2),
        outstanding_balance: Decimal::new(balance_cents, 2),
        payment_terms: [15, 30, 45, 60, 90][idx % 5],
        first_contact_date: first_contact,
        last_contact_date: last_contact.max(first_contact),
        contract_start_date: contract_start,
        tags: Words(1..4).fake(),
        account_manager_id: match managers.len() {
            0 => None,
            n => Some(managers[idx % n]),
        },
        name,
    }
}
