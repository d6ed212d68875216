//! HTTP server implementation

use crate::dispatcher::Dispatcher;
use crate::shutdown::ShutdownSignal;
use crate::RuntimeState;
use bytes::Bytes;
use conduit_config::ServerConfig;
use conduit_core::{Body, Error, Result};
use http::{Request, Response};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use parking_lot::RwLock;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

/// HTTP server
pub struct Server {
    config: ServerConfig,
    dispatcher: Dispatcher,
    state: Arc<RwLock<RuntimeState>>,
    shutdown: ShutdownSignal,
    active_requests: Arc<AtomicUsize>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .field("state", &*self.state.read())
            .field("active_requests", &self.active_requests())
            .finish()
    }
}

/// Counts a request as in flight until dropped
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Server {
    /// Create a server for `dispatcher`
    pub fn new(config: ServerConfig, dispatcher: Dispatcher) -> Self {
        Self {
            config,
            dispatcher,
            state: Arc::new(RwLock::new(RuntimeState::Initializing)),
            shutdown: ShutdownSignal::new(),
            active_requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get the current state
    pub fn state(&self) -> RuntimeState {
        *self.state.read()
    }

    /// Get listen address
    pub fn listen_addr(&self) -> SocketAddr {
        self.config.listen
    }

    /// Requests currently being served
    pub fn active_requests(&self) -> usize {
        self.active_requests.load(Ordering::SeqCst)
    }

    /// Get shutdown signal
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Bind the configured address and serve until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.listen_addr()).await.map_err(|e| {
            Error::internal(format!("Failed to bind to {}: {}", self.listen_addr(), e))
        })?;

        self.run_with_listener(listener).await
    }

    /// Serve on an already bound listener until shutdown
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<()> {
        *self.state.write() = RuntimeState::Running;

        tracing::info!(
            listen = %listener.local_addr()?,
            routes = self.dispatcher.len(),
            max_body_size = self.config.max_body_size,
            "Server listening"
        );

        let max_body_size = self.config.max_body_size;

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            tracing::trace!("Accepted connection from {}", addr);

                            let dispatcher = self.dispatcher.clone();
                            let active = Arc::clone(&self.active_requests);

                            tokio::spawn(async move {
                                let service = hyper::service::service_fn(move |req| {
                                    let dispatcher = dispatcher.clone();
                                    let guard = InFlight::enter(&active);
                                    async move {
                                        let response = serve_request(&dispatcher, max_body_size, req).await;
                                        drop(guard);
                                        Ok::<_, Infallible>(response)
                                    }
                                });

                                let io = hyper_util::rt::TokioIo::new(stream);
                                if let Err(e) = hyper::server::conn::http1::Builder::new()
                                    .serve_connection(io, service)
                                    .await
                                {
                                    tracing::debug!("HTTP connection error: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }

                _ = self.shutdown.wait() => {
                    tracing::info!("Shutdown signal received");
                    break;
                }
            }
        }

        *self.state.write() = RuntimeState::ShuttingDown;
        drop(listener);

        let start = Instant::now();
        self.drain(start).await;

        *self.state.write() = RuntimeState::Stopped;

        tracing::info!(
            shutdown_duration_ms = start.elapsed().as_millis(),
            "Server stopped"
        );

        Ok(())
    }

    /// Wait for in-flight requests, bounded by the shutdown timeout
    async fn drain(&self, start: Instant) {
        let shutdown_timeout = self.config.shutdown_timeout;

        tracing::info!(
            timeout_secs = shutdown_timeout.as_secs(),
            "Waiting for in-flight requests to complete"
        );

        loop {
            let active = self.active_requests();

            if active == 0 {
                tracing::info!("All requests completed, shutting down cleanly");
                break;
            }

            if start.elapsed() >= shutdown_timeout {
                tracing::warn!(
                    active_requests = active,
                    "Shutdown timeout reached, forcing shutdown"
                );
                break;
            }

            tracing::debug!(
                active_requests = active,
                elapsed_ms = start.elapsed().as_millis(),
                "Waiting for active requests to complete"
            );

            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

/// Read the body within the size limit and dispatch
async fn serve_request(
    dispatcher: &Dispatcher,
    max_body_size: usize,
    req: Request<Incoming>,
) -> Response<Body> {
    let (parts, body) = req.into_parts();

    let bytes: Bytes = match Limited::new(body, max_body_size).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            return Error::validation(format!(
                "request body exceeds {max_body_size} bytes"
            ))
            .to_response();
        }
        Err(e) => {
            tracing::debug!("Failed to read request body: {}", e);
            return Error::validation(format!("failed to read request body: {e}")).to_response();
        }
    };

    let outcome = dispatcher.dispatch(Request::from_parts(parts, bytes)).await;
    if let Some(e) = &outcome.error {
        tracing::debug!(status = %outcome.response.status(), error = %e, "Request completed with error");
    }
    outcome.into_response()
}
