//! Middleware trait and chain composition
//!
//! A middleware step transforms the request [`Context`]. Steps are composed
//! into a [`Chain`] in registration order: the first step wraps the second,
//! which wraps the third, down to a terminal step that hands the context back
//! unchanged. Each step receives the rest of the chain as [`Next`] and may
//! run it, skip it by returning an error, or inspect its result.

use crate::{Context, Result};
use async_trait::async_trait;
use http::request::Parts;
use std::fmt;
use std::sync::Arc;

/// Middleware trait for context processing
#[async_trait]
pub trait Middleware: Send + Sync + fmt::Debug {
    /// Process a request
    ///
    /// # Arguments
    ///
    /// * `ctx` - The context produced by earlier steps
    /// * `req` - Method, URI and headers of the incoming request
    /// * `next` - The remaining steps of the chain
    ///
    /// # Returns
    ///
    /// Returns the context to continue with, or the error that aborts the request
    async fn call(&self, ctx: Context, req: &Parts, next: Next) -> Result<Context>;
}

/// Represents the next middleware in the chain
pub struct Next {
    middleware_stack: Arc<[Arc<dyn Middleware>]>,
    index: usize,
}

impl Next {
    /// Run the next middleware, or return the context once the chain is exhausted
    pub async fn run(self, ctx: Context, req: &Parts) -> Result<Context> {
        if let Some(middleware) = self.middleware_stack.get(self.index) {
            let next = Self {
                middleware_stack: Arc::clone(&self.middleware_stack),
                index: self.index + 1,
            };
            middleware.call(ctx, req, next).await
        } else {
            Ok(ctx)
        }
    }
}

impl Clone for Next {
    fn clone(&self) -> Self {
        Self {
            middleware_stack: Arc::clone(&self.middleware_stack),
            index: self.index,
        }
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("index", &self.index)
            .field("remaining", &(self.middleware_stack.len() - self.index))
            .finish()
    }
}

/// An immutable, composed middleware chain
///
/// Cloning is cheap; the steps are shared.
#[derive(Clone)]
pub struct Chain {
    middleware_stack: Arc<[Arc<dyn Middleware>]>,
}

impl Chain {
    /// The empty chain; running it returns the context unchanged
    pub fn identity() -> Self {
        Self {
            middleware_stack: Arc::new([]),
        }
    }

    /// Compose steps in execution order
    pub fn compose(steps: impl IntoIterator<Item = Arc<dyn Middleware>>) -> Self {
        Self {
            middleware_stack: steps.into_iter().collect(),
        }
    }

    /// A new chain with `step` appended after the existing steps
    pub fn then(&self, step: Arc<dyn Middleware>) -> Self {
        Self::compose(self.middleware_stack.iter().cloned().chain(Some(step)))
    }

    /// A new chain running `self` and then every step of `other`
    pub fn append(&self, other: &Chain) -> Self {
        Self::compose(
            self.middleware_stack
                .iter()
                .chain(other.middleware_stack.iter())
                .cloned(),
        )
    }

    /// Run the chain
    pub async fn run(&self, ctx: Context, req: &Parts) -> Result<Context> {
        let next = Next {
            middleware_stack: Arc::clone(&self.middleware_stack),
            index: 0,
        };
        next.run(ctx, req).await
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.middleware_stack.len()
    }

    /// True for the identity chain
    pub fn is_empty(&self) -> bool {
        self.middleware_stack.is_empty()
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<Vec<Arc<dyn Middleware>>> for Chain {
    fn from(steps: Vec<Arc<dyn Middleware>>) -> Self {
        Self::compose(steps)
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.middleware_stack.iter()).finish()
    }
}
