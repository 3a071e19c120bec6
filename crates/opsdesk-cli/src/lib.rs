//! # OpsDesk CLI
//!
//! Database seeding utilities for OpsDesk testing and development.
//!
//! This library crate provides the seeding functionality used by the CLI binary.
//!
//! ## Usage
//!
//! ```ignore
//! use opsdesk_cli::seeder::{seed_all, SeedConfig};
//!
//! let config = SeedConfig::new(200, 50); // 200 customers, 50 vendors
//! seed_all(&pool, config).await?;
//! ```

pub mod seeder;
