//! Vendor models, payloads and field rules.

use chrono::{DateTime, NaiveDate, Utc};
use opsdesk_core::serde::empty_string_as_none;
use opsdesk_core::{FieldErrors, PaginationMeta, PaginationParams};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use sqlx::types::Json;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::business_rules::BusinessFacts;
use crate::entities::{
    Contact, ContactPayload, EntityInput, EntityPayload, UniqueField, check_date_order,
    check_iso_date, check_money, check_payment_terms, check_tags, check_uuid, clean,
    clean_contacts, clean_email, clean_tags, derived_rules, into_contacts, parse_opt_date,
    parse_opt_days, parse_opt_money,
};
use crate::enums::define_pg_enum;
use crate::ids::{PrincipalId, VendorId};
use crate::value_types::{CURRENCY_REGEX, PHONE_REGEX};

pub const VENDOR_CODE_PREFIX: &str = "VEND";

define_pg_enum!(
    VendorStatus as "vendor_status" {
        Active => "active",
        Inactive => "inactive",
        /// Terminal: no longer supplying.
        Former => "former",
    }
);

define_pg_enum!(
    VendorPriority as "vendor_priority" {
        Low => "low",
        Normal => "normal",
        High => "high",
        Critical => "critical",
    }
);

fn check_status(value: &str) -> Result<(), ValidationError> {
    VendorStatus::check_member(value)
}

fn check_priority(value: &str) -> Result<(), ValidationError> {
    VendorPriority::check_member(value)
}

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct Vendor {
    pub id: VendorId,
    /// `VEND` followed by six digits; never reused, even after deletion.
    pub vendor_code: String,
    pub name: String,
    pub service_category: Option<String>,
    pub tax_id: Option<String>,
    pub status: VendorStatus,
    pub priority: VendorPriority,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub credit_limit: Option<Decimal>,
    pub outstanding_balance: Decimal,
    pub payment_terms: Option<i32>,
    pub currency: String,
    pub first_contact_date: Option<NaiveDate>,
    pub last_contact_date: Option<NaiveDate>,
    pub contract_start_date: Option<NaiveDate>,
    pub contract_end_date: Option<NaiveDate>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub account_manager_id: Option<PrincipalId>,
    #[schema(value_type = Vec<Contact>)]
    pub additional_contacts: Json<Vec<Contact>>,
    pub created_by: Option<PrincipalId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Create/update body for a vendor. Updates replace the whole record.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct VendorPayload {
    #[validate(required, length(max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 100))]
    pub service_category: Option<String>,
    #[validate(length(max = 50))]
    pub tax_id: Option<String>,
    #[validate(required, custom(function = "check_status"))]
    pub status: Option<String>,
    /// Defaults to `normal`.
    #[validate(custom(function = "check_priority"))]
    pub priority: Option<String>,
    #[validate(email, length(max = 255))]
    pub email: Option<String>,
    #[validate(length(max = 20), regex(path = *PHONE_REGEX))]
    pub phone: Option<String>,
    #[validate(url, length(max = 255))]
    pub website: Option<String>,
    #[validate(length(max = 255))]
    pub address_line1: Option<String>,
    #[validate(length(max = 255))]
    pub address_line2: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub state: Option<String>,
    #[validate(length(max = 20))]
    pub postal_code: Option<String>,
    #[validate(length(max = 100))]
    pub country: Option<String>,
    /// Amount as a number or numeric string.
    #[validate(custom(function = "check_money"))]
    #[schema(value_type = Option<String>, example = "1500.00")]
    pub credit_limit: Option<Value>,
    #[validate(custom(function = "check_money"))]
    #[schema(value_type = Option<String>, example = "0.00")]
    pub outstanding_balance: Option<Value>,
    /// Days, 0 to 365.
    #[validate(custom(function = "check_payment_terms"))]
    #[schema(value_type = Option<i32>, example = 30)]
    pub payment_terms: Option<Value>,
    #[validate(regex(path = *CURRENCY_REGEX))]
    pub currency: Option<String>,
    #[validate(custom(function = "check_iso_date"))]
    pub first_contact_date: Option<String>,
    #[validate(custom(function = "check_iso_date"))]
    pub last_contact_date: Option<String>,
    #[validate(custom(function = "check_iso_date"))]
    pub contract_start_date: Option<String>,
    #[validate(custom(function = "check_iso_date"))]
    pub contract_end_date: Option<String>,
    #[validate(
        length(max = 20, message = "The tags may not have more than 20 items."),
        custom(function = "check_tags")
    )]
    pub tags: Option<Vec<String>>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
    #[validate(custom(function = "check_uuid"))]
    pub account_manager_id: Option<String>,
    #[validate(length(max = 10, message = "The additional contacts may not have more than 10 items."))]
    pub additional_contacts: Option<Vec<ContactPayload>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorInput {
    pub name: String,
    pub service_category: Option<String>,
    pub tax_id: Option<String>,
    pub status: VendorStatus,
    pub priority: VendorPriority,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub credit_limit: Option<Decimal>,
    pub outstanding_balance: Decimal,
    pub payment_terms: Option<i32>,
    pub currency: String,
    pub first_contact_date: Option<NaiveDate>,
    pub last_contact_date: Option<NaiveDate>,
    pub contract_start_date: Option<NaiveDate>,
    pub contract_end_date: Option<NaiveDate>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub account_manager_id: Option<PrincipalId>,
    pub additional_contacts: Vec<Contact>,
}

impl EntityPayload for VendorPayload {
    type Input = VendorInput;

    const TABLE: &'static str = "vendors";

    fn normalize(self) -> Self {
        Self {
            name: clean(self.name),
            service_category: clean(self.service_category),
            tax_id: clean(self.tax_id),
            status: clean(self.status),
            priority: clean(self.priority),
            email: clean_email(self.email),
            phone: clean(self.phone),
            website: clean(self.website),
            address_line1: clean(self.address_line1),
            address_line2: clean(self.address_line2),
            city: clean(self.city),
            state: clean(self.state),
            postal_code: clean(self.postal_code),
            country: clean(self.country),
            credit_limit: self.credit_limit,
            outstanding_balance: self.outstanding_balance,
            payment_terms: self.payment_terms,
            currency: clean(self.currency).map(|c| c.to_uppercase()),
            first_contact_date: clean(self.first_contact_date),
            last_contact_date: clean(self.last_contact_date),
            contract_start_date: clean(self.contract_start_date),
            contract_end_date: clean(self.contract_end_date),
            tags: clean_tags(self.tags),
            notes: clean(self.notes),
            account_manager_id: clean(self.account_manager_id),
            additional_contacts: clean_contacts(self.additional_contacts),
        }
    }

    fn field_rules(&self) -> FieldErrors {
        let mut errors = derived_rules(self);
        check_date_order(
            &mut errors,
            "last_contact_date",
            self.last_contact_date.as_ref(),
            "first_contact_date",
            self.first_contact_date.as_ref(),
            false,
        );
        check_date_order(
            &mut errors,
            "contract_end_date",
            self.contract_end_date.as_ref(),
            "contract_start_date",
            self.contract_start_date.as_ref(),
            true,
        );
        errors
    }

    fn unique_fields(&self) -> Vec<UniqueField> {
        let mut fields = Vec::new();
        if let Some(email) = &self.email {
            fields.push(UniqueField {
                column: "email",
                value: email.clone(),
            });
        }
        if let Some(tax_id) = &self.tax_id {
            fields.push(UniqueField {
                column: "tax_id",
                value: tax_id.clone(),
            });
        }
        fields
    }

    fn account_manager_id(&self) -> Option<Uuid> {
        self.account_manager_id
            .as_deref()
            .and_then(|id| Uuid::parse_str(id).ok())
    }

    fn additional_contacts(&self) -> &[ContactPayload] {
        self.additional_contacts.as_deref().unwrap_or_default()
    }

    fn into_input(self) -> Option<VendorInput> {
        let account_manager_id = self.account_manager_id().map(PrincipalId::from_uuid);
        Some(VendorInput {
            status: VendorStatus::parse(self.status.as_deref()?)?,
            priority: match self.priority.as_deref() {
                Some(priority) => VendorPriority::parse(priority)?,
                None => VendorPriority::Normal,
            },
            first_contact_date: parse_opt_date(self.first_contact_date.as_ref())?,
            last_contact_date: parse_opt_date(self.last_contact_date.as_ref())?,
            contract_start_date: parse_opt_date(self.contract_start_date.as_ref())?,
            contract_end_date: parse_opt_date(self.contract_end_date.as_ref())?,
            additional_contacts: into_contacts(self.additional_contacts)?,
            name: self.name?,
            service_category: self.service_category,
            tax_id: self.tax_id,
            email: self.email,
            phone: self.phone,
            website: self.website,
            address_line1: self.address_line1,
            address_line2: self.address_line2,
            city: self.city,
            state: self.state,
            postal_code: self.postal_code,
            country: self.country,
            credit_limit: parse_opt_money(self.credit_limit.as_ref())?,
            outstanding_balance: parse_opt_money(self.outstanding_balance.as_ref())?
                .unwrap_or_default(),
            payment_terms: parse_opt_days(self.payment_terms.as_ref())?,
            currency: self.currency.unwrap_or_else(|| "USD".to_string()),
            tags: self.tags.unwrap_or_default(),
            notes: self.notes,
            account_manager_id,
        })
    }
}

impl EntityInput for VendorInput {
    fn business_facts(&self) -> BusinessFacts {
        BusinessFacts {
            entity_plural: "vendors",
            high_priority_label: "Critical",
            is_active: self.status == VendorStatus::Active,
            is_high_priority: self.priority == VendorPriority::Critical,
            is_terminal: self.status == VendorStatus::Former,
            has_phone: self.phone.is_some(),
            has_email: self.email.is_some(),
            credit_limit: self.credit_limit,
            outstanding_balance: Some(self.outstanding_balance),
            has_complete_address: self.address_line1.is_some()
                && self.city.is_some()
                && self.postal_code.is_some()
                && self.country.is_some(),
            has_contract_start_date: self.contract_start_date.is_some(),
            has_last_contact_date: self.last_contact_date.is_some(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct VendorFilterParams {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub service_category: Option<String>,
    /// Matches name, code, email or tax id.
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub search: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginatedVendorsResponse {
    pub data: Vec<Vendor>,
    pub meta: PaginationMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> VendorPayload {
        VendorPayload {
            name: Some("Northwind Supplies".to_string()),
            status: Some("active".to_string()),
            email: Some("sales@northwind.test".to_string()),
            contract_start_date: Some("2023-03-01".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_vendor_has_no_prospect_status() {
        let errors = VendorPayload {
            status: Some("prospect".to_string()),
            ..payload()
        }
        .field_rules();
        assert!(errors.contains("status"));
    }

    #[test]
    fn test_tax_id_is_unique_checked() {
        let payload = VendorPayload {
            tax_id: Some(" 12-3456789 ".to_string()),
            ..payload()
        }
        .normalize();
        let columns: Vec<_> = payload.unique_fields().iter().map(|f| f.column).collect();
        assert_eq!(columns, vec!["email", "tax_id"]);
        assert_eq!(payload.unique_fields()[1].value, "12-3456789");
    }

    #[test]
    fn test_critical_vendor_facts() {
        let input = VendorPayload {
            priority: Some("critical".to_string()),
            address_line1: Some("1 Harbor Way".to_string()),
            city: Some("Oakland".to_string()),
            postal_code: Some("94607".to_string()),
            country: Some("US".to_string()),
            ..payload()
        }
        .normalize()
        .into_input()
        .unwrap();
        let facts = input.business_facts();
        assert!(facts.is_high_priority);
        assert!(facts.has_complete_address);
        assert_eq!(facts.high_priority_label, "Critical");
    }

    #[test]
    fn test_contract_end_must_follow_start() {
        let errors = VendorPayload {
            contract_end_date: Some("2023-03-01".to_string()),
            ..payload()
        }
        .normalize()
        .field_rules();
        assert_eq!(
            errors.get("contract_end_date").unwrap(),
            ["The contract end date must be a date after contract start date."]
        );
    }
}
