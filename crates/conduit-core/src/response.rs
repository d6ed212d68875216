//! Response builder and utilities

use crate::{Error, Result};
use bytes::Bytes;
use http::{header, Response, StatusCode};
use http_body_util::Full;
use serde::Serialize;

/// Body type alias
pub type Body = Full<Bytes>;

/// Content type written on every JSON response
pub const APPLICATION_JSON: &str = "application/json";

/// Response builder for convenient response construction
#[derive(Debug)]
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Vec<(header::HeaderName, String)>,
}

impl ResponseBuilder {
    /// Create a new response builder
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
        }
    }

    /// 200 OK
    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// Set a header
    pub fn header(mut self, name: header::HeaderName, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Build response with empty body
    pub fn build(self) -> Result<Response<Body>> {
        let mut response = Response::builder().status(self.status);

        for (name, value) in self.headers {
            response = response.header(name, value);
        }

        Ok(response.body(Full::new(Bytes::new()))?)
    }

    /// Build response with JSON body
    ///
    /// Encoding failures surface as [`Error::Encode`].
    pub fn json_body<T: Serialize + ?Sized>(self, body: &T) -> Result<Response<Body>> {
        let json = serde_json::to_vec(body).map_err(Error::Encode)?;

        let mut response = Response::builder()
            .status(self.status)
            .header(header::CONTENT_TYPE, APPLICATION_JSON);

        for (name, value) in self.headers {
            response = response.header(name, value);
        }

        Ok(response.body(Full::new(Bytes::from(json)))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_response_builder() {
        let response = ResponseBuilder::new(StatusCode::NO_CONTENT)
            .header(header::HeaderName::from_static("x-custom"), "value")
            .build()
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers().get("x-custom").unwrap(), "value");
    }

    #[test]
    fn test_json_response() {
        let data = serde_json::json!({ "msg": "ok" });

        let response = ResponseBuilder::ok().json_body(&data).unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            APPLICATION_JSON
        );
    }

    #[test]
    fn test_unencodable_body_is_encode_error() {
        // JSON object keys must be strings
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], 1);

        let err = ResponseBuilder::ok().json_body(&map).unwrap_err();
        assert!(matches!(err, Error::Encode(_)));
    }
}
