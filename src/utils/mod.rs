//! Shared helpers for the feature modules.
//!
//! - [`codes`]: Generated external identifiers (`CUST000123`, `VEND004567`)

pub mod codes;
