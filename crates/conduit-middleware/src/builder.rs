//! Middleware chain builder
//!
//! This module provides a builder pattern for constructing middleware chains.

use crate::*;
use std::sync::Arc;

/// Middleware chain builder
#[derive(Debug, Default)]
pub struct MiddlewareBuilder {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareBuilder {
    /// Create a new middleware builder
    #[must_use]
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    /// Add a `pre`-phase request logger
    #[must_use]
    pub fn with_incoming_logging(mut self) -> Self {
        self.middlewares.push(Arc::new(RequestLogger::incoming()));
        self
    }

    /// Add a `post`-phase completion logger
    #[must_use]
    pub fn with_completed_logging(mut self) -> Self {
        self.middlewares.push(Arc::new(RequestLogger::completed()));
        self
    }

    /// Add a request logger with custom configuration
    #[must_use]
    pub fn with_logging_config(mut self, phase: LogPhase, config: LoggingConfig) -> Self {
        self.middlewares
            .push(Arc::new(RequestLogger::with_config(phase, config)));
        self
    }

    /// Add token authentication
    #[must_use]
    pub fn with_token_auth(mut self, authority: Arc<dyn TokenAuthority>) -> Self {
        self.middlewares
            .push(Arc::new(TokenAuthentication::new(authority)));
        self
    }

    /// Add token authentication with custom configuration
    #[must_use]
    pub fn with_token_auth_config(
        mut self,
        authority: Arc<dyn TokenAuthority>,
        config: TokenAuthConfig,
    ) -> Self {
        self.middlewares
            .push(Arc::new(TokenAuthentication::with_config(authority, config)));
        self
    }

    /// Add custom middleware
    #[must_use]
    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Build the middleware chain
    #[must_use]
    pub fn build(self) -> Chain {
        Chain::compose(self.middlewares)
    }

    /// Get the number of middlewares in the chain
    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Check if the chain is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_empty() {
        let chain = MiddlewareBuilder::new().build();
        assert!(chain.is_empty());
    }

    #[test]
    fn test_builder_single_middleware() {
        let chain = MiddlewareBuilder::new().with_incoming_logging().build();
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_builder_multiple_middlewares() {
        let builder = MiddlewareBuilder::new()
            .with_incoming_logging()
            .with_token_auth(Arc::new(Hs256Authority::new("secret")))
            .with_completed_logging();

        assert_eq!(builder.len(), 3);
        assert!(!builder.is_empty());
        assert_eq!(builder.build().len(), 3);
    }
}
