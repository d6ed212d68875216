//! Typed handlers and payload binding
//!
//! A handler is registered with concrete request and response types. The
//! dispatcher only sees the type-erased [`Endpoint`]; each endpoint decodes
//! its own JSON body, optionally validates it, calls the handler and encodes
//! the response.

use async_trait::async_trait;
use bytes::Bytes;
use conduit_core::{Body, Context, Error, Parts, ResponseBuilder, Result};
use futures::future::BoxFuture;
use http::{HeaderMap, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock};

/// Request headers and query parameters, for handlers that ask for them
#[derive(Debug, Clone, Default)]
pub struct Meta {
    /// Request headers
    pub headers: HeaderMap,
    /// Decoded query parameters in request order; keys may repeat
    pub query: Vec<(String, String)>,
}

impl Meta {
    /// Build from request parts
    pub fn from_parts(parts: &Parts) -> Self {
        let query = parts
            .uri
            .query()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();

        Self {
            headers: parts.headers.clone(),
            query,
        }
    }

    /// First value of a query parameter
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All values of a query parameter
    pub fn query_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.query
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Optional payload capability, run when a route is marked validated
pub trait Validate {
    /// Check the decoded payload; return a validation error to reject it
    fn validate(&self, ctx: &Context) -> Result<()>;
}

type SimpleFn<Req, Resp> = dyn Fn(Context, Req) -> BoxFuture<'static, Result<Resp>> + Send + Sync;
type MetaFn<Req, Resp> =
    dyn Fn(Context, Req, Meta) -> BoxFuture<'static, Result<Resp>> + Send + Sync;

/// A handler in one of its two supported shapes
pub enum Handler<Req, Resp> {
    /// `(Context, Req)`
    Simple(Arc<SimpleFn<Req, Resp>>),
    /// `(Context, Req, Meta)`
    WithMeta(Arc<MetaFn<Req, Resp>>),
}

impl<Req, Resp> Handler<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Wrap an async `(Context, Req)` function
    pub fn simple<F, Fut>(f: F) -> Self
    where
        F: Fn(Context, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp>> + Send + 'static,
    {
        Handler::Simple(Arc::new(move |ctx, req| Box::pin(f(ctx, req))))
    }

    /// Wrap an async `(Context, Req, Meta)` function
    pub fn with_meta<F, Fut>(f: F) -> Self
    where
        F: Fn(Context, Req, Meta) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp>> + Send + 'static,
    {
        Handler::WithMeta(Arc::new(move |ctx, req, meta| Box::pin(f(ctx, req, meta))))
    }

    /// Call the handler; `Meta` is only built for the shape that takes it
    pub async fn invoke(&self, ctx: Context, req: Req, parts: &Parts) -> Result<Resp> {
        match self {
            Handler::Simple(f) => f(ctx, req).await,
            Handler::WithMeta(f) => f(ctx, req, Meta::from_parts(parts)).await,
        }
    }

    /// Shape name, for logs
    pub fn shape(&self) -> &'static str {
        match self {
            Handler::Simple(_) => "simple",
            Handler::WithMeta(_) => "with_meta",
        }
    }
}

impl<Req, Resp> Clone for Handler<Req, Resp> {
    fn clone(&self) -> Self {
        match self {
            Handler::Simple(f) => Handler::Simple(Arc::clone(f)),
            Handler::WithMeta(f) => Handler::WithMeta(Arc::clone(f)),
        }
    }
}

impl<Req, Resp> fmt::Debug for Handler<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Simple(_) => f.write_str("Handler::Simple"),
            Handler::WithMeta(_) => f.write_str("Handler::WithMeta"),
        }
    }
}

/// Decode a JSON request body; an empty or whitespace-only body is the default value
pub fn decode_body<Req: DeserializeOwned + Default>(body: &[u8]) -> Result<Req> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Req::default());
    }
    serde_json::from_slice(body).map_err(Error::Decode)
}

type Validator<Req> = fn(&Req, &Context) -> Result<()>;

/// Type-erased endpoint held by the dispatcher
#[async_trait]
pub(crate) trait Endpoint: Send + Sync + fmt::Debug {
    /// Decode, validate, handle and encode one request
    async fn serve(&self, ctx: Context, parts: &Parts, body: Bytes) -> Result<Response<Body>>;
}

/// Endpoint bound to concrete payload types
pub(crate) struct TypedEndpoint<Req, Resp> {
    handler: Handler<Req, Resp>,
    validator: OnceLock<Validator<Req>>,
}

impl<Req, Resp> TypedEndpoint<Req, Resp> {
    pub(crate) fn new(handler: Handler<Req, Resp>) -> Self {
        Self {
            handler,
            validator: OnceLock::new(),
        }
    }
}

impl<Req: Validate, Resp> TypedEndpoint<Req, Resp> {
    /// Turn on payload validation; idempotent
    pub(crate) fn enable_validation(&self) {
        let _ = self.validator.set(<Req as Validate>::validate);
    }
}

impl<Req, Resp> fmt::Debug for TypedEndpoint<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedEndpoint")
            .field("request", &std::any::type_name::<Req>())
            .field("response", &std::any::type_name::<Resp>())
            .field("shape", &self.handler)
            .field("validated", &self.validator.get().is_some())
            .finish()
    }
}

#[async_trait]
impl<Req, Resp> Endpoint for TypedEndpoint<Req, Resp>
where
    Req: DeserializeOwned + Default + Send + Sync + 'static,
    Resp: Serialize + Send + Sync + 'static,
{
    async fn serve(&self, ctx: Context, parts: &Parts, body: Bytes) -> Result<Response<Body>> {
        let req: Req = decode_body(&body)?;

        if let Some(validate) = self.validator.get() {
            validate(&req, &ctx)?;
        }

        let resp = self.handler.invoke(ctx, req, parts).await?;

        ResponseBuilder::ok().json_body(&resp)
    }
}
