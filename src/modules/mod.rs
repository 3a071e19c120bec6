pub mod auth;
pub mod customers;
pub mod principals;
pub mod sessions;
pub mod vendors;
