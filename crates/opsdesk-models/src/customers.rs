//! Customer models, payloads and field rules.

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
use crate::ids::{CustomerId, PrincipalId};
use crate::value_types::{CURRENCY_REGEX, PHONE_REGEX};

pub const CUSTOMER_CODE_PREFIX: &str = "CUST";

define_pg_enum!(
    CustomerStatus as "customer_status" {
        Prospect => "prospect",
        Active => "active",
        Inactive => "inactive",
        /// Terminal: the relationship has ended.
        Former => "former",
    }
);

define_pg_enum!(
    CustomerPriority as "customer_priority" {
        Low => "low",
        Normal => "normal",
        High => "high",
        Vip => "vip",
    }
);

define_pg_enum!(
    CustomerType as "customer_type" {
        Individual => "individual",
        Business => "business",
    }
);

fn check_status(value: &str) -> Result<(), ValidationError> {
    CustomerStatus::check_member(value)
}

fn check_priority(value: &str) -> Result<(), ValidationError> {
    CustomerPriority::check_member(value)
}

fn check_customer_type(value: &str) -> Result<(), ValidationError> {
    CustomerType::check_member(value)
}

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct Customer {
    pub id: CustomerId,
    /// `CUST` followed by six digits; never reused, even after deletion.
    pub customer_code: String,
    pub name: String,
    pub customer_type: CustomerType,
    pub industry: Option<String>,
    pub status: CustomerStatus,
    pub priority: CustomerPriority,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
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

/// Create/update body for a customer. Updates replace the whole record.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CustomerPayload {
    #[validate(required, length(max = 255))]
    pub name: Option<String>,
    #[validate(required, custom(function = "check_customer_type"))]
    pub customer_type: Option<String>,
    #[validate(length(max = 100))]
    pub industry: Option<String>,
    #[validate(required, custom(function = "check_status"))]
    pub status: Option<String>,
    /// Defaults to `normal`.
    #[validate(custom(function = "check_priority"))]
    pub priority: Option<String>,
    #[validate(email, length(max = 255))]
    pub email: Option<String>,
    #[validate(length(max = 20), regex(path = *PHONE_REGEX))]
    pub phone: Option<String>,
    #[validate(length(max = 20), regex(path = *PHONE_REGEX))]
    pub mobile: Option<String>,
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
    /// Three-letter code, defaults to `USD`.
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

/// A customer payload that passed every field, store and nested rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerInput {
    pub name: String,
    pub customer_type: CustomerType,
    pub industry: Option<String>,
    pub status: CustomerStatus,
    pub priority: CustomerPriority,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
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

impl EntityPayload for CustomerPayload {
    type Input = CustomerInput;

    const TABLE: &'static str = "customers";

    fn normalize(self) -> Self {
        Self {
            name: clean(self.name),
            customer_type: clean(self.customer_type),
            industry: clean(self.industry),
            status: clean(self.status),
            priority: clean(self.priority),
            email: clean_email(self.email),
            phone: clean(self.phone),
            mobile: clean(self.mobile),
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
        self.email
            .iter()
            .map(|email| UniqueField {
                column: "email",
                value: email.clone(),
            })
            .collect()
    }

    fn account_manager_id(&self) -> Option<Uuid> {
        self.account_manager_id
            .as_deref()
            .and_then(|id| Uuid::parse_str(id).ok())
    }

    fn additional_contacts(&self) -> &[ContactPayload] {
        self.additional_contacts.as_deref().unwrap_or_default()
    }

    fn into_input(self) -> Option<CustomerInput> {
        let account_manager_id = self.account_manager_id().map(PrincipalId::from_uuid);
        Some(CustomerInput {
            customer_type: CustomerType::parse(self.customer_type.as_deref()?)?,
            status: CustomerStatus::parse(self.status.as_deref()?)?,
            priority: match self.priority.as_deref() {
                Some(priority) => CustomerPriority::parse(priority)?,
                None => CustomerPriority::Normal,
            },
            first_contact_date: parse_opt_date(self.first_contact_date.as_ref())?,
            last_contact_date: parse_opt_date(self.last_contact_date.as_ref())?,
            contract_start_date: parse_opt_date(self.contract_start_date.as_ref())?,
            contract_end_date: parse_opt_date(self.contract_end_date.as_ref())?,
            additional_contacts: into_contacts(self.additional_contacts)?,
            name: self.name?,
            industry: self.industry,
            email: self.email,
            phone: self.phone,
            mobile: self.mobile,
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

impl EntityInput for CustomerInput {
    fn business_facts(&self) -> BusinessFacts {
        BusinessFacts {
            entity_plural: "customers",
            high_priority_label: "VIP",
            is_active: self.status == CustomerStatus::Active,
            is_high_priority: self.priority == CustomerPriority::Vip,
            is_terminal: self.status == CustomerStatus::Former,
            has_phone: self.phone.is_some() || self.mobile.is_some(),
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
pub struct CustomerFilterParams {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub priority: Option<String>,
    /// Matches name, code or email.
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub search: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginatedCustomersResponse {
    pub data: Vec<Customer>,
    pub meta: PaginationMeta,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn payload() -> CustomerPayload {
        CustomerPayload {
            name: Some("Acme Corp".to_string()),
            customer_type: Some("business".to_string()),
            status: Some("active".to_string()),
            phone: Some("+15551234567".to_string()),
            contract_start_date: Some("2024-01-01".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_payload_has_no_field_errors() {
        assert!(payload().normalize().field_rules().is_empty());
    }

    #[test]
    fn test_normalization() {
        let normalized = CustomerPayload {
            name: Some("  Acme Corp  ".to_string()),
            email: Some(" Billing@ACME.com ".to_string()),
            industry: Some("".to_string()),
            currency: Some("eur".to_string()),
            tags: Some(vec!["vip".to_string(), "vip".to_string()]),
            ..payload()
        }
        .normalize();

        assert_eq!(normalized.name.as_deref(), Some("Acme Corp"));
        assert_eq!(normalized.email.as_deref(), Some("billing@acme.com"));
        assert_eq!(normalized.industry, None);
        assert_eq!(normalized.currency.as_deref(), Some("EUR"));
        assert_eq!(normalized.tags, Some(vec!["vip".to_string()]));
    }

    #[test]
    fn test_field_rules_accumulate() {
        let errors = CustomerPayload {
            name: None,
            status: Some("dormant".to_string()),
            phone: Some("call me".to_string()),
            website: Some("not a url".to_string()),
            payment_terms: Some(json!(400)),
            credit_limit: Some(json!("-5")),
            first_contact_date: Some("2024-06-01".to_string()),
            last_contact_date: Some("2024-05-01".to_string()),
            ..payload()
        }
        .normalize()
        .field_rules();

        assert_eq!(
            errors.fields().collect::<Vec<_>>(),
            vec![
                "credit_limit",
                "last_contact_date",
                "name",
                "payment_terms",
                "phone",
                "status",
                "website"
            ]
        );
        assert_eq!(errors.get("status").unwrap(), ["The selected status is invalid."]);
        assert_eq!(errors.get("name").unwrap(), ["The name field is required."]);
        assert_eq!(errors.get("phone").unwrap(), ["The phone format is invalid."]);
    }

    #[test]
    fn test_wrongly_typed_numbers_are_field_errors() {
        let payload: CustomerPayload = serde_json::from_value(json!({
            "name": "Acme Corp",
            "customer_type": "alien",
            "status": "active",
            "email": "not-an-email",
            "payment_terms": "thirty",
            "credit_limit": {"amount": 5},
        }))
        .unwrap();

        let errors = payload.normalize().field_rules();

        assert_eq!(
            errors.fields().collect::<Vec<_>>(),
            vec!["credit_limit", "customer_type", "email", "payment_terms"]
        );
        assert_eq!(
            errors.get("payment_terms").unwrap(),
            ["The payment terms must be an integer."]
        );
        assert_eq!(
            errors.get("credit_limit").unwrap(),
            ["The credit limit must be a number."]
        );
    }

    #[test]
    fn test_numeric_strings_become_typed_values() {
        let input = CustomerPayload {
            credit_limit: Some(json!("1500.50")),
            outstanding_balance: Some(json!(250)),
            payment_terms: Some(json!("30")),
            ..payload()
        }
        .normalize()
        .into_input()
        .unwrap();

        assert_eq!(input.credit_limit, Some(dec!(1500.50)));
        assert_eq!(input.outstanding_balance, dec!(250));
        assert_eq!(input.payment_terms, Some(30));
    }

    #[test]
    fn test_into_input_applies_defaults() {
        let input = payload().normalize().into_input().unwrap();
        assert_eq!(input.priority, CustomerPriority::Normal);
        assert_eq!(input.currency, "USD");
        assert_eq!(input.outstanding_balance, Decimal::ZERO);
        assert_eq!(
            input.contract_start_date,
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
    }

    #[test]
    fn test_business_facts() {
        let input = CustomerPayload {
            priority: Some("vip".to_string()),
            status: Some("former".to_string()),
            ..payload()
        }
        .normalize()
        .into_input()
        .unwrap();
        let facts = input.business_facts();
        assert!(facts.is_high_priority);
        assert!(facts.is_terminal);
        assert!(!facts.is_active);
        assert!(!facts.has_complete_address);
    }

    #[test]
    fn test_unique_fields_only_when_present() {
        assert!(payload().unique_fields().is_empty());
        let with_email = CustomerPayload {
            email: Some("ops@acme.com".to_string()),
            ..payload()
        };
        assert_eq!(with_email.unique_fields()[0].column, "email");
    }
}
