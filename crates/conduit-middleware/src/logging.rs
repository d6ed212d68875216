//! Request logging middleware
//!
//! Registered as a `pre` step it logs the incoming request and stamps the
//! context with a start time; registered as a `post` step it logs completion
//! with the latency measured from that stamp.

use async_trait::async_trait;
use conduit_core::{Context, Middleware, Next, Parts, Result};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::Level;

/// Context key holding the request start time (microseconds since the epoch)
pub const STARTED_AT_KEY: &str = "request_started_at_us";

macro_rules! event_at {
    ($level:expr, $($fields:tt)+) => {
        match $level {
            Level::TRACE => tracing::trace!($($fields)+),
            Level::DEBUG => tracing::debug!($($fields)+),
            Level::INFO => tracing::info!($($fields)+),
            Level::WARN => tracing::warn!($($fields)+),
            _ => tracing::error!($($fields)+),
        }
    };
}

/// Which side of the handler the logger runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogPhase {
    /// Before the handler: logs the request
    Incoming,
    /// After the response is produced: logs completion and latency
    Completed,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level for requests
    pub log_level: Level,
    /// Whether to log request headers
    pub log_headers: bool,
    /// Headers to redact (e.g., Authorization, Cookie)
    pub sensitive_headers: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            log_headers: true,
            sensitive_headers: vec![
                "authorization".to_string(),
                "cookie".to_string(),
                "set-cookie".to_string(),
                "x-api-key".to_string(),
            ],
        }
    }
}

/// Request logging middleware
///
/// Logs requests with structured fields using tracing, redacting sensitive
/// headers.
#[derive(Clone)]
pub struct RequestLogger {
    config: LoggingConfig,
    phase: LogPhase,
}

impl RequestLogger {
    /// Logger for the `pre` phase with default config
    pub fn incoming() -> Self {
        Self::with_config(LogPhase::Incoming, LoggingConfig::default())
    }

    /// Logger for the `post` phase with default config
    pub fn completed() -> Self {
        Self::with_config(LogPhase::Completed, LoggingConfig::default())
    }

    /// Create a logger with custom config
    pub fn with_config(phase: LogPhase, config: LoggingConfig) -> Self {
        Self { config, phase }
    }

    /// Phase this logger runs in
    pub fn phase(&self) -> LogPhase {
        self.phase
    }

    /// Check if a header should be redacted
    fn should_redact(&self, header_name: &str) -> bool {
        self.config
            .sensitive_headers
            .iter()
            .any(|h| h.eq_ignore_ascii_case(header_name))
    }

    /// Redact a header value
    fn redact_value(&self, header_name: &str, value: &str) -> String {
        if self.should_redact(header_name) {
            "[REDACTED]".to_string()
        } else {
            value.to_string()
        }
    }

    fn headers(&self, req: &Parts) -> Vec<String> {
        req.headers
            .iter()
            .map(|(name, value)| {
                let value_str = value.to_str().unwrap_or("[invalid UTF-8]");
                format!("{}: {}", name, self.redact_value(name.as_str(), value_str))
            })
            .collect()
    }
}

fn now_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_micros()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

impl fmt::Debug for RequestLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLogger")
            .field("phase", &self.phase)
            .field("log_level", &self.config.log_level)
            .field("log_headers", &self.config.log_headers)
            .finish()
    }
}

#[async_trait]
impl Middleware for RequestLogger {
    async fn call(&self, ctx: Context, req: &Parts, next: Next) -> Result<Context> {
        let method = &req.method;
        let uri = &req.uri;
        let request_id = ctx.request_id().to_string();

        match self.phase {
            LogPhase::Incoming => {
                if self.config.log_headers {
                    let headers = self.headers(req);
                    event_at!(
                        self.config.log_level,
                        method = %method,
                        uri = %uri,
                        request_id = %request_id,
                        headers = ?headers,
                        "Incoming request"
                    );
                } else {
                    event_at!(
                        self.config.log_level,
                        method = %method,
                        uri = %uri,
                        request_id = %request_id,
                        "Incoming request"
                    );
                }

                next.run(ctx.with_value(STARTED_AT_KEY, now_micros()), req)
                    .await
            }
            LogPhase::Completed => {
                let latency_us = ctx
                    .value::<i64>(STARTED_AT_KEY)
                    .ok()
                    .map(|started| now_micros().saturating_sub(started));

                event_at!(
                    self.config.log_level,
                    method = %method,
                    uri = %uri,
                    request_id = %request_id,
                    latency_us = ?latency_us,
                    "Request completed"
                );

                next.run(ctx, req).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::Chain;
    use http::Request;
    use std::sync::Arc;

    fn parts() -> Parts {
        Request::builder()
            .uri("/hc")
            .header("Authorization", "Token secret")
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[tokio::test]
    async fn test_incoming_stamps_start_time() {
        let chain = Chain::compose([Arc::new(RequestLogger::incoming()) as Arc<dyn Middleware>]);

        let ctx = chain.run(Context::new(), &parts()).await.unwrap();

        assert!(ctx.value::<i64>(STARTED_AT_KEY).unwrap() > 0);
    }

    #[tokio::test]
    async fn test_completed_passes_context_through() {
        let chain = Chain::compose([Arc::new(RequestLogger::completed()) as Arc<dyn Middleware>]);
        let ctx = Context::new().with_value("email", "jake@jake.jake");

        let out = chain.run(ctx, &parts()).await.unwrap();

        assert_eq!(out.value::<String>("email").unwrap(), "jake@jake.jake");
        assert!(out.value::<i64>(STARTED_AT_KEY).is_err());
    }

    #[test]
    fn test_sensitive_header_redaction() {
        let logger = RequestLogger::incoming();

        assert_eq!(logger.redact_value("Authorization", "Token abc"), "[REDACTED]");
        assert_eq!(logger.redact_value("Cookie", "session=abc"), "[REDACTED]");
        assert_eq!(
            logger.redact_value("Content-Type", "application/json"),
            "application/json"
        );
        assert!(logger
            .headers(&parts())
            .iter()
            .all(|h| !h.contains("secret")));
    }

    #[tokio::test]
    async fn test_custom_logging_config() {
        let config = LoggingConfig {
            log_level: Level::DEBUG,
            log_headers: false,
            sensitive_headers: vec!["X-Custom-Token".to_string()],
        };
        let logger = RequestLogger::with_config(LogPhase::Incoming, config);
        assert_eq!(logger.phase(), LogPhase::Incoming);
        assert!(logger.should_redact("x-custom-token"));

        let chain = Chain::compose([Arc::new(logger) as Arc<dyn Middleware>]);
        assert!(chain.run(Context::new(), &parts()).await.is_ok());
    }
}
