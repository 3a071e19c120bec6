//! Data models for database seeding configuration.

use chrono::NaiveDate;
use opsdesk_models::{
    CustomerPriority, CustomerStatus, CustomerType, PrincipalId, Role, VendorPriority,
    VendorStatus,
};
use rust_decimal::Decimal;

/// Seed data for creating a principal.
pub struct PrincipalSeed {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Fields shared by seeded customers and vendors.
pub struct ContactSeed {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address_line1: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub credit_limit: Decimal,
    pub outstanding_balance: Decimal,
    pub payment_terms: i32,
    pub first_contact_date: NaiveDate,
    pub last_contact_date: NaiveDate,
    pub contract_start_date: NaiveDate,
    pub tags: Vec<String>,
    pub account_manager_id: Option<PrincipalId>,
}

/// Seed data for creating a customer.
pub struct CustomerSeed {
    pub code: String,
    pub customer_type: CustomerType,
    pub industry: String,
    pub status: CustomerStatus,
    pub priority: CustomerPriority,
    pub contact: ContactSeed,
}

/// Seed data for creating a vendor.
pub struct VendorSeed {
    pub code: String,
    pub service_category: String,
    pub tax_id: String,
    pub status: VendorStatus,
    pub priority: VendorPriority,
    pub contact: ContactSeed,
}

/// Configuration for number of staff principals.
#[derive(Clone)]
pub struct StaffCounts {
    pub managers: usize,
    pub employees: usize,
}

impl Default for StaffCounts {
    fn default() -> Self {
        Self {
            managers: 3,
            employees: 10,
        }
    }
}

/// Complete configuration for database seeding.
#[derive(Clone, Default)]
pub struct SeedConfig {
    pub staff: StaffCounts,
    pub customers: usize,
    pub vendors: usize,
}

impl SeedConfig {
    pub fn new(customers: usize, vendors: usize) -> Self {
        Self {
            customers,
            vendors,
            ..Default::default()
        }
    }

    pub fn with_staff(mut self, staff: StaffCounts) -> Self {
        self.staff = staff;
        self
    }

    pub fn total_principals(&self) -> usize {
        self.staff.managers + self.staff.employees
    }
}
