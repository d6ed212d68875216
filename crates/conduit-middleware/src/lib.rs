//! # Conduit Middleware
//!
//! Built-in middleware collection with:
//! - Token authentication against a pluggable token authority
//! - Request logging with header redaction and latency

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod auth;
pub mod builder;
pub mod logging;

pub use auth::{
    Claims, Hs256Authority, TokenAuthConfig, TokenAuthentication, TokenAuthority,
    NOT_AUTHENTICATED,
};
pub use builder::MiddlewareBuilder;
pub use logging::{LogPhase, LoggingConfig, RequestLogger, STARTED_AT_KEY};

// Re-export core middleware types from conduit-core
pub use conduit_core::middleware::{Chain, Middleware, Next};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::auth::{Hs256Authority, TokenAuthentication, TokenAuthority};
    pub use crate::builder::MiddlewareBuilder;
    pub use crate::logging::{LogPhase, LoggingConfig, RequestLogger};
    pub use conduit_core::middleware::{Chain, Middleware, Next};
}
