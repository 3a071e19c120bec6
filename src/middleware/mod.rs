//! Request-processing middleware.
//!
//! # Modules
//!
//! - [`audit`]: Before/after request logging with redaction and slow-request warnings
//! - [`auth`]: Authentication gate and the [`auth::AuthPrincipal`] extractor
//! - [`caller`]: Caller detection (machine vs. browser) and request context
//! - [`pipeline`]: [`pipeline::GatePipeline`], the fixed gate order for route groups
//! - [`reporter`]: Error reporting and browser response shaping
//! - [`role`]: Role gate
//! - [`status`]: Status gate
//!
//! # Request Flow
//!
//! ```text
//! audit -> reporter -> auth gate -> status gate -> role gate -> handler
//! ```
//!
//! 1. The audit logger records the request before anything else runs
//! 2. The authentication gate resolves the session token into a `CurrentPrincipal`
//! 3. The status gate terminates sessions of inactive principals
//! 4. The role gate checks the route group's allowed roles
//! 5. Any error on the way back is logged and shaped by the reporter
//!
//! # Example
//!
//! ```ignore
//! use crate::middleware::auth::AuthPrincipal;
//!
//! async fn show_profile(AuthPrincipal(principal): AuthPrincipal) -> impl IntoResponse {
//!     // Only reached by active principals with an admitted role
//! }
//! ```

pub mod audit;
pub mod auth;
pub mod caller;
pub mod pipeline;
pub mod reporter;
pub mod role;
pub mod status;
