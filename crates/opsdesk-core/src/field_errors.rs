//! Field-keyed validation errors.
//!
//! Validation in OpsDesk is accumulative: every failing rule adds a message
//! under its field key instead of stopping at the first failure. Keys are
//! kept in a `BTreeMap` so the same input always yields the same, identically
//! ordered error set.
//!
//! Nested fields use dotted paths, e.g. `additional_contacts.2.email`.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;
use validator::{ValidationError, ValidationErrors, ValidationErrorsKind};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    /// Merges `other` with every key prefixed by `prefix.`.
    pub fn merge_prefixed(&mut self, prefix: &str, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0
                .entry(format!("{}.{}", prefix, field))
                .or_default()
                .extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of fields with at least one error.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Flattens `validator` output into dotted field keys.
    pub fn from_validation(errors: &ValidationErrors) -> Self {
        let mut out = Self::new();
        collect(&mut out, None, errors);
        out
    }
}

/// Struct-level (`schema`) rules land under `__all__`; one that belongs to a
/// single field names it in this param.
pub const FIELD_PARAM: &str = "field";

fn join(prefix: Option<&str>, field: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}.{}", prefix, field),
        None => field.to_string(),
    }
}

fn collect(out: &mut FieldErrors, prefix: Option<&str>, errors: &ValidationErrors) {
    // `validator` keeps fields in a HashMap; sort so messages come out in a stable order.
    let mut entries: Vec<_> = errors.errors().iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    for (field, kind) in entries {
        let key = join(prefix, field);
        match kind {
            ValidationErrorsKind::Field(list) => {
                for error in list {
                    let key = match error.params.get(FIELD_PARAM) {
                        Some(Value::String(target)) if *field == "__all__" => {
                            join(prefix, target)
                        }
                        _ => key.clone(),
                    };
                    out.add(&key, describe(&key, error));
                }
            }
            ValidationErrorsKind::Struct(inner) => collect(out, Some(&key), inner),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect(out, Some(&format!("{}.{}", key, index)), inner);
                }
            }
        }
    }
}

/// Human-readable name for a field key: `additional_contacts.0.email` -> `email`.
fn attribute(key: &str) -> String {
    key.rsplit('.').next().unwrap_or(key).replace('_', " ")
}

fn describe(key: &str, error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }

    let name = attribute(key);
    let param = |p: &str| error.params.get(p).map(render_param);
    match error.code.as_ref() {
        "length" => match (param("min"), param("max")) {
            (Some(min), Some(max)) => {
                format!("The {} must be between {} and {} characters.", name, min, max)
            }
            (None, Some(max)) => format!("The {} may not be greater than {} characters.", name, max),
            (Some(min), None) => format!("The {} must be at least {} characters.", name, min),
            (None, None) => format!("The {} has an invalid length.", name),
        },
        "range" => match (param("min"), param("max")) {
            (Some(min), Some(max)) => format!("The {} must be between {} and {}.", name, min, max),
            (None, Some(max)) => format!("The {} may not be greater than {}.", name, max),
            (Some(min), None) => format!("The {} must be at least {}.", name, min),
            (None, None) => format!("The {} is out of range.", name),
        },
        "email" => format!("The {} must be a valid email address.", name),
        "url" => format!("The {} format is invalid.", name),
        "regex" => format!("The {} format is invalid.", name),
        "required" => format!("The {} field is required.", name),
        "in" => format!("The selected {} is invalid.", name),
        "date" => format!("The {} is not a valid date.", name),
        "uuid" => format!("The {} must be a valid UUID.", name),
        "numeric" => format!("The {} must be a number.", name),
        "integer" => format!("The {} must be an integer.", name),
        "money" => format!("The {} must be a valid amount with at most two decimal places.", name),
        "confirmed" => format!("The {} confirmation does not match.", name),
        _ => format!("The {} is invalid.", name),
    }
}

fn render_param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
