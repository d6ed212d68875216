//! Route definition and builder

use crate::matcher::PathPattern;
use conduit_core::{Error, Result};
use http::Method;

/// Route definition: a method bound to a compiled path pattern
#[derive(Debug, Clone)]
pub struct Route {
    /// HTTP method
    pub method: Method,

    /// Compiled path pattern (e.g., "/articles/{slug}")
    pub pattern: PathPattern,
}

impl Route {
    /// Create a new route builder
    pub fn builder() -> RouteBuilder {
        RouteBuilder::new()
    }

    /// Original pattern text
    pub fn path(&self) -> &str {
        self.pattern.pattern()
    }

    /// Match a request, returning captured parameters on success
    pub fn matches(&self, method: &Method, path: &str) -> Option<Vec<(String, String)>> {
        if &self.method != method {
            return None;
        }
        self.pattern.matches(path)
    }
}

/// Builder for constructing routes
#[derive(Debug, Default)]
pub struct RouteBuilder {
    method: Option<Method>,
    path: Option<String>,
}

impl RouteBuilder {
    /// Create a new route builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the HTTP method
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Set the path pattern
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Build the route, compiling the pattern
    pub fn build(self) -> Result<Route> {
        let method = self
            .method
            .ok_or_else(|| Error::Config("method is required".to_string()))?;

        let path = self
            .path
            .ok_or_else(|| Error::Config("path is required".to_string()))?;

        if !path.starts_with('/') {
            return Err(Error::InvalidPattern {
                pattern: path,
                reason: "path must start with '/'".to_string(),
            });
        }

        Ok(Route {
            method,
            pattern: PathPattern::parse(path)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_builder() {
        let route = RouteBuilder::new()
            .method(Method::GET)
            .path("/api/articles/{slug}")
            .build()
            .unwrap();

        assert_eq!(route.method, Method::GET);
        assert_eq!(route.path(), "/api/articles/{slug}");
        assert_eq!(route.pattern.param_names(), vec!["slug"]);
    }

    #[test]
    fn test_route_builder_missing_fields() {
        let result = RouteBuilder::new().path("/api/tags").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_route_builder_invalid_path() {
        let result = RouteBuilder::new()
            .method(Method::GET)
            .path("api/tags") // Missing leading slash
            .build();

        assert!(matches!(result, Err(Error::InvalidPattern { .. })));
    }

    #[test]
    fn test_method_must_match() {
        let route = Route::builder()
            .method(Method::POST)
            .path("/api/users")
            .build()
            .unwrap();

        assert!(route.matches(&Method::POST, "/api/users").is_some());
        assert!(route.matches(&Method::GET, "/api/users").is_none());
    }
}
