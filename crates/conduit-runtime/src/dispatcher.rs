//! Request dispatcher
//!
//! The dispatcher owns the route table. Routes are registered during startup
//! under the write lock; serving only takes the read lock long enough to
//! clone the matched entry.
//!
//! For a matched request the phases run in this order:
//!
//! 1. `pre` chain, which may reject the request
//! 2. body decoding into the route's request type
//! 3. payload validation, when the route is marked validated
//! 4. the handler
//! 5. JSON encoding of the handler's response
//! 6. `post` chain, only once a response exists
//!
//! A panic in any phase is caught and turned into an internal error.

use crate::handler::{Endpoint, Handler, TypedEndpoint, Validate};
use bytes::Bytes;
use conduit_core::{Body, Chain, Context, Error, Middleware, Parts, Result};
use conduit_router::{LinearTable, Route, RouteId, RouteMatcher};
use futures::FutureExt;
use http::{Method, Request, Response};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

#[derive(Debug, Clone)]
struct RouteEntry {
    endpoint: Arc<dyn Endpoint>,
    pre: Chain,
    post: Chain,
}

#[derive(Debug)]
struct Registry {
    matcher: Box<dyn RouteMatcher>,
    entries: Vec<RouteEntry>,
}

impl Registry {
    fn entry_mut(&mut self, id: RouteId) -> Option<&mut RouteEntry> {
        self.entries.get_mut(id.0)
    }
}

/// Result of dispatching one request
///
/// `error` is set whenever something failed. For a `post` failure the
/// response is the handler's successful one and `error` still reports the
/// failure.
#[derive(Debug)]
pub struct Outcome {
    /// Response to send
    pub response: Response<Body>,
    /// Failure raised while serving, if any
    pub error: Option<Error>,
}

impl Outcome {
    fn ok(response: Response<Body>) -> Self {
        Self {
            response,
            error: None,
        }
    }

    fn failed(error: Error) -> Self {
        Self {
            response: error.to_response(),
            error: Some(error),
        }
    }

    /// True when no phase failed
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Drop the error report, keeping the response
    pub fn into_response(self) -> Response<Body> {
        self.response
    }
}

/// Route table plus per-route middleware
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<RwLock<Registry>>,
}

impl Dispatcher {
    /// Create a dispatcher backed by the linear route table
    pub fn new() -> Self {
        Self::with_matcher(Box::new(LinearTable::new()))
    }

    /// Create a dispatcher with a custom lookup strategy
    ///
    /// The matcher must be empty.
    pub fn with_matcher(matcher: Box<dyn RouteMatcher>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Registry {
                matcher,
                entries: Vec::new(),
            })),
        }
    }

    /// Register a handler for `method` and `pattern`
    ///
    /// Registration order is match order. The returned handle attaches
    /// middleware and validation to this route.
    pub fn register<Req, Resp>(
        &self,
        method: Method,
        pattern: &str,
        handler: Handler<Req, Resp>,
    ) -> Result<RouteHandle<Req, Resp>>
    where
        Req: DeserializeOwned + Default + Send + Sync + 'static,
        Resp: Serialize + Send + Sync + 'static,
    {
        let route = Route::builder().method(method.clone()).path(pattern).build()?;
        let shape = handler.shape();
        let endpoint = Arc::new(TypedEndpoint::new(handler));

        let mut registry = self.inner.write();
        if registry.matcher.len() != registry.entries.len() {
            return Err(Error::internal(format!(
                "route table holds {} routes but dispatcher holds {}",
                registry.matcher.len(),
                registry.entries.len()
            )));
        }
        let id = registry.matcher.insert(route);
        if id.0 != registry.entries.len() {
            return Err(Error::internal(format!(
                "route table out of step with dispatcher at {id}"
            )));
        }
        registry.entries.push(RouteEntry {
            endpoint: Arc::clone(&endpoint) as Arc<dyn Endpoint>,
            pre: Chain::identity(),
            post: Chain::identity(),
        });

        debug!(%method, pattern, %id, shape, "Registered route");

        Ok(RouteHandle {
            inner: Arc::clone(&self.inner),
            id,
            endpoint,
            _payload: PhantomData,
        })
    }

    /// Number of registered routes
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// True when no route is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serve one request whose body has already been read
    pub async fn dispatch(&self, request: Request<Bytes>) -> Outcome {
        let (parts, body) = request.into_parts();
        let path = parts.uri.path();

        let found = {
            let registry = self.inner.read();
            registry
                .matcher
                .find(&parts.method, path)
                .and_then(|m| registry.entries.get(m.id.0).cloned().map(|e| (m, e)))
        };

        let Some((matched, entry)) = found else {
            debug!(method = %parts.method, path, "No route matched");
            return Outcome::failed(Error::RouteNotFound {
                method: parts.method.clone(),
                path: path.to_string(),
            });
        };

        let ctx = Context::new().with_path_vars(matched.params);
        debug!(
            method = %parts.method,
            path,
            route = %matched.id,
            request_id = ctx.request_id(),
            "Dispatching request"
        );

        let ctx = match guarded("pre", entry.pre.run(ctx, &parts)).await {
            Ok(ctx) => ctx,
            Err(e) => {
                debug!(route = %matched.id, kind = e.kind().as_str(), error = %e, "Pre phase rejected request");
                return Outcome::failed(e);
            }
        };

        let response = match guarded("handler", entry.endpoint.serve(ctx.clone(), &parts, body)).await {
            Ok(response) => response,
            Err(e) => {
                debug!(route = %matched.id, kind = e.kind().as_str(), error = %e, "Request failed");
                return Outcome::failed(e);
            }
        };

        match guarded("post", entry.post.run(ctx, &parts)).await {
            Ok(_) => Outcome::ok(response),
            Err(e) => {
                warn!(route = %matched.id, error = %e, "Post phase failed after response was produced");
                Outcome {
                    response,
                    error: Some(e),
                }
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.len())
            .finish()
    }
}

/// Run one phase, converting a panic into [`Error::Panic`]
async fn guarded<T>(phase: &'static str, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(phase, panic = %message, "Request phase panicked");
            Err(Error::Panic(message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Handle for configuring a registered route
pub struct RouteHandle<Req, Resp> {
    inner: Arc<RwLock<Registry>>,
    id: RouteId,
    endpoint: Arc<TypedEndpoint<Req, Resp>>,
    _payload: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> RouteHandle<Req, Resp> {
    /// Id of the route in the dispatcher's table
    pub fn id(&self) -> RouteId {
        self.id
    }

    /// Append a step to the `pre` chain
    pub fn pre(self, step: impl Middleware + 'static) -> Self {
        self.update(|entry| entry.pre = entry.pre.then(Arc::new(step)))
    }

    /// Append a step to the `post` chain
    pub fn post(self, step: impl Middleware + 'static) -> Self {
        self.update(|entry| entry.post = entry.post.then(Arc::new(step)))
    }

    /// Append every step of `chain` to the `pre` chain
    pub fn pre_chain(self, chain: &Chain) -> Self {
        self.update(|entry| entry.pre = entry.pre.append(chain))
    }

    /// Append every step of `chain` to the `post` chain
    pub fn post_chain(self, chain: &Chain) -> Self {
        self.update(|entry| entry.post = entry.post.append(chain))
    }

    fn update(self, apply: impl FnOnce(&mut RouteEntry)) -> Self {
        if let Some(entry) = self.inner.write().entry_mut(self.id) {
            apply(entry);
        }
        self
    }
}

impl<Req: Validate, Resp> RouteHandle<Req, Resp> {
    /// Validate decoded payloads before calling the handler
    pub fn validated(self) -> Self {
        self.endpoint.enable_validation();
        self
    }
}

impl<Req, Resp> fmt::Debug for RouteHandle<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteHandle")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
