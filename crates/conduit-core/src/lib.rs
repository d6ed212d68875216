//! # Conduit Core
//!
//! Core types shared by the routing, middleware, storage and runtime crates:
//! - Error type and its wire classification
//! - Per-request context
//! - Middleware trait and chain composition
//! - JSON response builder

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod context;
pub mod error;
pub mod middleware;
pub mod response;

pub use context::{Context, ContextValue, FromContextValue, Scope};
pub use error::{Error, ErrorKind, Result};
pub use middleware::{Chain, Middleware, Next};
pub use response::{Body, ResponseBuilder};

// Re-export commonly used HTTP types
pub use bytes::Bytes;
pub use http::request::Parts;
pub use http::{HeaderMap, Method, Request, Response, StatusCode};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::context::{Context, FromContextValue};
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::middleware::{Chain, Middleware, Next};
    pub use crate::response::ResponseBuilder;
}
