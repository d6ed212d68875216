//! Routes served by the binary itself

use conduit_core::{Method, Result};
use conduit_middleware::{MiddlewareBuilder, RequestLogger};
use conduit_runtime::{Dispatcher, Handler};
use conduit_store::{Store, StoreBackend};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize)]
pub struct Health {
    pub msg: &'static str,
}

/// The health check takes no input
#[derive(Debug, Default, Deserialize)]
pub struct NoInput {}

/// Report healthy once the store reads back what it writes
async fn health(store: Store) -> Result<Health> {
    store.health_check().await?;
    Ok(Health { msg: "ok" })
}

/// Register `GET /hc` with request logging on both sides
pub fn register(dispatcher: &Dispatcher, store: Store) -> Result<()> {
    let incoming = MiddlewareBuilder::new().with_incoming_logging().build();

    dispatcher
        .register(
            Method::GET,
            "/hc",
            Handler::simple(move |_ctx, _req: NoInput| health(store.clone())),
        )?
        .pre_chain(&incoming)
        .post(RequestLogger::completed());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::{Bytes, Request, StatusCode};
    use conduit_store::InMemoryBackend;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_health_check() {
        let store = Store::Memory(InMemoryBackend::new());
        let dispatcher = Dispatcher::new();
        register(&dispatcher, store.clone()).unwrap();

        let request = Request::builder().uri("/hc").body(Bytes::new()).unwrap();
        let outcome = dispatcher.dispatch(request).await;

        assert!(outcome.is_ok());
        assert_eq!(outcome.response.status(), StatusCode::OK);

        let body = outcome.response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], br#"{"msg":"ok"}"#);
        assert!(store.get("_health:check").await.unwrap().is_none());
    }
}
