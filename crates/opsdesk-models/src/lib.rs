//! # OpsDesk Models
//!
//! Domain models, request payloads and validation rules for the OpsDesk API.
//!
//! # Modules
//!
//! - [`ids`]: Strongly-typed entity IDs
//! - [`value_types`]: Validated primitives (email, phone and currency patterns)
//! - [`principals`]: Accounts, roles, statuses and auth DTOs
//! - [`sessions`]: Server-side login sessions
//! - [`entities`]: Payload plumbing shared by customers and vendors
//! - [`customers`]: Customer records and payloads
//! - [`vendors`]: Vendor records and payloads
//! - [`business_rules`]: Cross-field rules run after field validation

mod enums;

pub mod business_rules;
pub mod customers;
pub mod entities;
pub mod ids;
pub mod principals;
pub mod sessions;
pub mod value_types;
pub mod vendors;

// Re-export commonly used types at crate root for convenience
pub use business_rules::{BusinessFacts, check_business_rules};
pub use customers::{
    CUSTOMER_CODE_PREFIX, Customer, CustomerFilterParams, CustomerInput, CustomerPayload,
    CustomerPriority, CustomerStatus, CustomerType, PaginatedCustomersResponse,
};
pub use entities::{
    Contact, ContactPayload, EntityInput, EntityPayload, UniqueField,
};
pub use ids::{CustomerId, PrincipalId, SessionId, VendorId};
pub use principals::{
    AuthMethod, CredentialError, CurrentPrincipal, ExternalIdentity, LoginRequest, LoginResponse,
    NewPrincipal, PaginatedPrincipalsResponse, Principal, PrincipalFilterParams, PrincipalStatus,
    RegisterRequest, Role, UpdateProfileRequest, UpdateRoleRequest, UpdateStatusRequest,
};
pub use sessions::{ClientContext, Session};
pub use value_types::{Email, PHONE_REGEX, ValueTypeError};
pub use vendors::{
    PaginatedVendorsResponse, VENDOR_CODE_PREFIX, Vendor, VendorFilterParams, VendorInput,
    VendorPayload, VendorPriority, VendorStatus,
};
