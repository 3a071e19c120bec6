//! Pagination utilities for list endpoints.
//!
//! List endpoints take `?page=&per_page=` query parameters and answer with
//! `{ "data": [...], "meta": { ... } }`.
//!
//! # Example
//!
//! ```ignore
//! let params = PaginationParams { page: Some(3), per_page: Some(20) };
//! assert_eq!(params.offset(), 40);
//!
//! let meta = PaginationMeta::new(total, &params);
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

const DEFAULT_PER_PAGE: i64 = 15;
const MAX_PER_PAGE: i64 = 100;

/// Deserializes an optional string into an optional i64.
///
/// Query strings such as `?page=` should be treated as absent.
fn deserialize_optional_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => s.parse::<i64>().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// Metadata about a paginated response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaginationMeta {
    /// Total number of items across all pages
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub last_page: i64,
    /// Whether there are more items after this page
    pub has_more: bool,
}

impl PaginationMeta {
    pub fn new(total: i64, params: &PaginationParams) -> Self {
        let per_page = params.per_page();
        let page = params.page();
        let last_page = ((total + per_page - 1) / per_page).max(1);
        Self {
            total,
            page,
            per_page,
            last_page,
            has_more: params.offset() + per_page < total,
        }
    }
}

/// Page-based pagination parameters.
///
/// - `per_page` is clamped to [1, 100], default 15
/// - `page` is clamped to a minimum of 1, default 1
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PaginationParams {
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    pub per_page: Option<i64>,
}

impl PaginationParams {
    #[must_use]
    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }

    #[must_use]
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.per_page()
    }
}
