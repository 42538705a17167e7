//! HTTP middleware stack.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, transaction per route)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Rate limiting on register and login (governor)
//! 5. Store authentication (extractor, per handler)

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::StoreAuth;
pub use rate_limit::{auth_rate_limiter, rate_limit_rejection};
pub use request_id::request_id_middleware;
