//! # Conduit Runtime
//!
//! Serving layer for Conduit handlers:
//! - Typed handlers in two shapes, with JSON payload binding
//! - Dispatcher owning the route table and per-route middleware
//! - Hyper HTTP/1 server with a request body limit
//! - Graceful shutdown with signal handling and a bounded drain

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod dispatcher;
pub mod handler;
pub mod server;
pub mod shutdown;

pub use dispatcher::{Dispatcher, Outcome, RouteHandle};
pub use handler::{decode_body, Handler, Meta, Validate};
pub use server::Server;
pub use shutdown::{ShutdownSignal, SignalHandler};

/// Runtime state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    /// Server is initializing
    Initializing,
    /// Server is running
    Running,
    /// Server is shutting down
    ShuttingDown,
    /// Server is stopped
    Stopped,
}

/// Re-export commonly used types
pub mod prelude {
    pub use crate::dispatcher::{Dispatcher, Outcome, RouteHandle};
    pub use crate::handler::{Handler, Meta, Validate};
    pub use crate::server::Server;
    pub use crate::shutdown::{ShutdownSignal, SignalHandler};
    pub use crate::RuntimeState;
}
