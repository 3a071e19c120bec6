//! Pieces shared by the business entity payloads (customers and vendors).
//!
//! A payload arrives as loosely typed JSON: every field is optional and enum
//! or date fields are plain strings. That keeps body decoding from failing on
//! the first bad value, so field rules can report every problem at once.

use chrono::NaiveDate;
use opsdesk_core::FieldErrors;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::business_rules::BusinessFacts;
use crate::value_types::PHONE_REGEX;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Store-level checks a payload asks for, run against its entity table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueField {
    pub column: &'static str,
    pub value: String,
}

/// A business entity create/update body.
pub trait EntityPayload: Validate + Sized {
    type Input: EntityInput;

    /// Table the store rules run against.
    const TABLE: &'static str;

    /// Trims strings, turns empty strings into `None`, lower-cases emails and
    /// de-duplicates tags.
    fn normalize(self) -> Self;

    /// Format, length, range, membership and date-ordering rules.
    fn field_rules(&self) -> FieldErrors;

    fn unique_fields(&self) -> Vec<UniqueField>;

    fn account_manager_id(&self) -> Option<Uuid>;

    fn additional_contacts(&self) -> &[ContactPayload];

    /// Converts a payload whose field rules passed into its typed record.
    fn into_input(self) -> Option<Self::Input>;
}

pub trait EntityInput {
    fn business_facts(&self) -> BusinessFacts;
}

/// One element of `additional_contacts`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct ContactPayload {
    #[validate(required, length(max = 255))]
    pub name: Option<String>,
    #[validate(email, length(max = 255))]
    pub email: Option<String>,
    #[validate(length(max = 20), regex(path = *PHONE_REGEX))]
    pub phone: Option<String>,
    #[validate(length(max = 100))]
    pub position: Option<String>,
}

impl ContactPayload {
    pub fn normalize(self) -> Self {
        Self {
            name: clean(self.name),
            email: clean_email(self.email),
            phone: clean(self.phone),
            position: clean(self.position),
        }
    }

    pub fn field_rules(&self) -> FieldErrors {
        match self.validate() {
            Ok(()) => FieldErrors::new(),
            Err(errors) => FieldErrors::from_validation(&errors),
        }
    }

    fn into_contact(self) -> Option<Contact> {
        Some(Contact {
            name: self.name?,
            email: self.email,
            phone: self.phone,
            position: self.position,
        })
    }
}

/// A stored additional contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Contact {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position: Option<String>,
}

pub(crate) fn into_contacts(contacts: Option<Vec<ContactPayload>>) -> Option<Vec<Contact>> {
    contacts
        .unwrap_or_default()
        .into_iter()
        .map(ContactPayload::into_contact)
        .collect()
}

pub(crate) fn clean(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

pub(crate) fn clean_email(value: Option<String>) -> Option<String> {
    clean(value).map(|v| v.to_lowercase())
}

/// Trims tags, drops empty ones and removes duplicates keeping first occurrence.
pub(crate) fn clean_tags(tags: Option<Vec<String>>) -> Option<Vec<String>> {
    tags.map(|tags| {
        let mut out: Vec<String> = Vec::with_capacity(tags.len());
        for tag in tags {
            let tag = tag.trim();
            if !tag.is_empty() && !out.iter().any(|t| t == tag) {
                out.push(tag.to_string());
            }
        }
        out
    })
}

pub(crate) fn clean_contacts(contacts: Option<Vec<ContactPayload>>) -> Option<Vec<ContactPayload>> {
    contacts.map(|list| list.into_iter().map(ContactPayload::normalize).collect())
}

pub(crate) fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

pub(crate) fn parse_opt_date(value: Option<&String>) -> Option<Option<NaiveDate>> {
    match value {
        Some(v) => parse_date(v).map(Some),
        None => Some(None),
    }
}

pub(crate) fn check_iso_date(value: &str) -> Result<(), ValidationError> {
    match parse_date(value) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("date")),
    }
}

pub(crate) fn check_uuid(value: &str) -> Result<(), ValidationError> {
    Uuid::parse_str(value)
        .map(|_| ())
        .map_err(|_| ValidationError::new("uuid"))
}

/// Reads an amount sent either as a JSON number or a numeric string.
pub(crate) fn money_value(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str_exact(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Reads a whole number sent either as a JSON integer or a digit string.
pub(crate) fn whole_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `None` for an absent field, `Some(None)` for one that does not parse.
pub(crate) fn parse_opt_money(value: Option<&Value>) -> Option<Option<Decimal>> {
    match value {
        Some(v) => money_value(v).map(Some),
        None => Some(None),
    }
}

pub(crate) fn parse_opt_days(value: Option<&Value>) -> Option<Option<i32>> {
    match value {
        Some(v) => whole_number(v)
            .and_then(|days| i32::try_from(days).ok())
            .map(Some),
        None => Some(None),
    }
}

/// Money fields: numeric, non-negative, at most two decimal places, fits
/// `NUMERIC(15,2)`.
pub(crate) fn check_money(value: &Value) -> Result<(), ValidationError> {
    let Some(amount) = money_value(value) else {
        return Err(ValidationError::new("numeric"));
    };
    let max = Decimal::new(999_999_999_999_999, 2);
    if amount.is_sign_negative() && !amount.is_zero() {
        let mut err = ValidationError::new("range");
        err.add_param("min".into(), &0);
        return Err(err);
    }
    if amount > max || amount.normalize().scale() > 2 {
        return Err(ValidationError::new("money"));
    }
    Ok(())
}

/// Payment terms in days, 0 to 365.
pub(crate) fn check_payment_terms(value: &Value) -> Result<(), ValidationError> {
    match whole_number(value) {
        Some(days) if (0..=365).contains(&days) => Ok(()),
        Some(_) => {
            let mut err = ValidationError::new("range");
            err.add_param("min".into(), &0);
            err.add_param("max".into(), &365);
            Err(err)
        }
        None => Err(ValidationError::new("integer")),
    }
}

pub(crate) fn check_tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.iter().any(|tag| tag.chars().count() > 50) {
        let mut err = ValidationError::new("tags");
        err.message = Some("Each tag may not be greater than 50 characters.".into());
        return Err(err);
    }
    Ok(())
}

/// `later` must be on or after `earlier` (or strictly after when `strict`).
pub(crate) fn check_date_order(
    errors: &mut FieldErrors,
    later_key: &str,
    later: Option<&String>,
    earlier_key: &str,
    earlier: Option<&String>,
    strict: bool,
) {
    let later = later.and_then(|v| parse_date(v));
    let earlier = earlier.and_then(|v| parse_date(v));
    let (Some(later), Some(earlier)) = (later, earlier) else {
        return;
    };
    let ok = if strict { later > earlier } else { later >= earlier };
    if !ok {
        let relation = if strict { "after" } else { "after or equal to" };
        errors.add(
            later_key,
            format!(
                "The {} must be a date {} {}.",
                later_key.replace('_', " "),
                relation,
                earlier_key.replace('_', " ")
            ),
        );
    }
}

/// Runs the derive-generated rules and flattens them into field keys.
pub(crate) fn derived_rules<T: Validate>(payload: &T) -> FieldErrors {
    match payload.validate() {
        Ok(()) => FieldErrors::new(),
        Err(errors) => FieldErrors::from_validation(&errors),
    }
}
