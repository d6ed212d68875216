//! # Conduit Router
//!
//! Route registry primitives:
//! - Path patterns with named parameters (`/articles/{slug}`)
//! - Regex-constrained parameters (`/items/{id:^[0-9]+$}`)
//! - Method-based routing
//! - First-match-wins lookup behind the [`RouteMatcher`] seam
//!
//! A route accepts a request only when the method is equal, the segment
//! counts are equal and every segment matches.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod matcher;
pub mod route;
pub mod table;

pub use matcher::{PathPattern, Segment};
pub use route::{Route, RouteBuilder};
pub use table::{LinearTable, Match, RouteId, RouteMatcher};
