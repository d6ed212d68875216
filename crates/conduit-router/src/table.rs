//! Route table
//!
//! [`RouteMatcher`] is the lookup seam used by the dispatcher. The shipped
//! implementation is a linear scan in registration order; a prefix tree can
//! replace it without changing what callers observe.

use crate::route::Route;
use http::Method;
use std::fmt;

/// Position of a route in its table, stable for the table's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteId(pub usize);

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of a successful route match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// The accepting route
    pub id: RouteId,

    /// Extracted path parameters, in pattern order
    pub params: Vec<(String, String)>,
}

impl Match {
    /// Look up a captured parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Route lookup strategy
///
/// Contract: routes are tried in insertion order and the first accepting
/// route wins. Duplicate method+pattern insertions are kept; the later one is
/// shadowed.
pub trait RouteMatcher: Send + Sync + fmt::Debug {
    /// Append a route, returning its id
    fn insert(&mut self, route: Route) -> RouteId;

    /// Find the first route accepting `method` and `path`
    fn find(&self, method: &Method, path: &str) -> Option<Match>;

    /// Get a route by id
    fn get(&self, id: RouteId) -> Option<&Route>;

    /// Number of routes
    fn len(&self) -> usize;

    /// True when no routes are registered
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Linear-scan route table
#[derive(Debug, Default)]
pub struct LinearTable {
    routes: Vec<Route>,
}

impl LinearTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// All routes in registration order
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

impl RouteMatcher for LinearTable {
    fn insert(&mut self, route: Route) -> RouteId {
        let id = RouteId(self.routes.len());
        tracing::debug!(
            method = %route.method,
            path = %route.path(),
            id = %id,
            "Route added to table"
        );
        self.routes.push(route);
        id
    }

    fn find(&self, method: &Method, path: &str) -> Option<Match> {
        self.routes.iter().enumerate().find_map(|(index, route)| {
            route.matches(method, path).map(|params| Match {
                id: RouteId(index),
                params,
            })
        })
    }

    fn get(&self, id: RouteId) -> Option<&Route> {
        self.routes.get(id.0)
    }

    fn len(&self) -> usize {
        self.routes.len()
    }
}
