use serde::Serialize;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

use opsdesk_core::{FieldErrors, PaginationMeta, PaginationParams};
use opsdesk_models::{
    Contact, ContactPayload, Customer, CustomerFilterParams, CustomerPayload, CustomerPriority,
    CustomerStatus, CustomerType, LoginRequest, LoginResponse, PaginatedCustomersResponse,
    PaginatedPrincipalsResponse, PaginatedVendorsResponse, Principal, PrincipalFilterParams,
    PrincipalStatus, RegisterRequest, Role, UpdateProfileRequest, UpdateRoleRequest,
    UpdateStatusRequest, Vendor, VendorFilterParams, VendorPayload, VendorPriority, VendorStatus,
};

use crate::modules::auth::model::MessageResponse;

/// Body of every non-validation error response.
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

/// Body of a `422` response: one list of messages per failing field.
#[derive(Serialize, ToSchema)]
pub struct ValidationErrorResponse {
    #[schema(example = "The given data was invalid.")]
    pub message: String,
    pub errors: FieldErrors,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::auth::controller::register,
        crate::modules::auth::controller::login,
        crate::modules::auth::controller::logout,
        crate::modules::auth::controller::get_me,
        crate::modules::auth::controller::update_me,
        crate::modules::customers::controller::list_customers,
        crate::modules::customers::controller::get_customer,
        crate::modules::customers::controller::create_customer,
        crate::modules::customers::controller::update_customer,
        crate::modules::customers::controller::delete_customer,
        crate::modules::vendors::controller::list_vendors,
        crate::modules::vendors::controller::get_vendor,
        crate::modules::vendors::controller::create_vendor,
        crate::modules::vendors::controller::update_vendor,
        crate::modules::vendors::controller::delete_vendor,
        crate::modules::principals::controller::list_principals,
        crate::modules::principals::controller::update_principal_status,
        crate::modules::principals::controller::update_principal_role,
        crate::modules::principals::controller::delete_principal,
    ),
    components(
        schemas(
            Principal,
            Role,
            PrincipalStatus,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            UpdateProfileRequest,
            UpdateStatusRequest,
            UpdateRoleRequest,
            PrincipalFilterParams,
            PaginatedPrincipalsResponse,
            Customer,
            CustomerType,
            CustomerStatus,
            CustomerPriority,
            CustomerPayload,
            CustomerFilterParams,
            PaginatedCustomersResponse,
            Vendor,
            VendorStatus,
            VendorPriority,
            VendorPayload,
            VendorFilterParams,
            PaginatedVendorsResponse,
            Contact,
            ContactPayload,
            MessageResponse,
            ErrorResponse,
            ValidationErrorResponse,
            FieldErrors,
            PaginationMeta,
            PaginationParams,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Login, logout and profile endpoints"),
        (name = "Customers", description = "Customer records"),
        (name = "Vendors", description = "Vendor records"),
        (name = "Principals", description = "Account administration (admin only)")
    ),
    info(
        title = "OpsDesk API",
        version = "0.1.0",
        description = "Customer and vendor management API with session-based authentication, role gates and audit logging.",
        license(
            name = "MIT"
        )
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}
