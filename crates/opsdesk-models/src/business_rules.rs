//! Cross-field rules for business entities.
//!
//! These run only once every field, store and nested rule has passed, so they
//! can assume well-typed input. Each failing rule adds its own error; nothing
//! short-circuits.

use opsdesk_core::FieldErrors;
use rust_decimal::Decimal;

/// The facts the cross-field rules look at, taken from a normalized record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusinessFacts {
    /// Plural display noun, e.g. `customers`.
    pub entity_plural: &'static str,
    /// Display label of the high-priority value, e.g. `VIP`.
    pub high_priority_label: &'static str,
    pub is_active: bool,
    pub is_high_priority: bool,
    pub is_terminal: bool,
    pub has_phone: bool,
    pub has_email: bool,
    pub credit_limit: Option<Decimal>,
    pub outstanding_balance: Option<Decimal>,
    /// Line 1, city, postal code and country are all present.
    pub has_complete_address: bool,
    pub has_contract_start_date: bool,
    pub has_last_contact_date: bool,
}

pub fn check_business_rules(facts: &BusinessFacts) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if let (Some(balance), Some(limit)) = (facts.outstanding_balance, facts.credit_limit) {
        if balance > limit {
            errors.add(
                "outstanding_balance",
                "The outstanding balance cannot exceed the credit limit.",
            );
        }
    }

    if facts.is_active && !facts.has_phone && !facts.has_email {
        errors.add(
            "phone",
            format!(
                "Active {} must have either phone or email contact information.",
                facts.entity_plural
            ),
        );
    }

    if facts.is_high_priority && !facts.has_complete_address {
        errors.add(
            "address_line1",
            format!(
                "{} {} should have a complete address (address line 1, city, postal code and country).",
                facts.high_priority_label, facts.entity_plural
            ),
        );
    }

    if facts.is_active && !facts.has_contract_start_date {
        errors.add(
            "contract_start_date",
            format!("Active {} should have a contract start date.", facts.entity_plural),
        );
    }

    if facts.is_terminal && !facts.has_last_contact_date {
        errors.add(
            "last_contact_date",
            format!("Former {} must have a last contact date.", facts.entity_plural),
        );
    }

    errors
}
