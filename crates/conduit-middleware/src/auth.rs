//! Token authentication middleware
//!
//! Reads `Authorization: Token <jwt>`, verifies it through a [`TokenAuthority`]
//! and injects one claim (by default `email`) into the request context. Every
//! failure is reported as forbidden.

use async_trait::async_trait;
use conduit_core::{Context, ContextValue, Error, Middleware, Next, Parts, Result};
use http::header;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Claims carried by a token
pub type Claims = Map<String, Value>;

/// Message returned for every authentication failure
pub const NOT_AUTHENTICATED: &str = "not authenticated";

/// Issues and verifies authentication tokens
pub trait TokenAuthority: Send + Sync + fmt::Debug {
    /// Sign claims into a token
    fn sign(&self, claims: &Claims) -> Result<String>;

    /// Verify a token and return its claims
    fn verify(&self, token: &str) -> Result<Claims>;
}

/// HMAC-SHA256 token authority
#[derive(Clone)]
pub struct Hs256Authority {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    validation: Validation,
}

impl Hs256Authority {
    /// Create an authority from a shared secret
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();

        let mut validation = Validation::new(Algorithm::HS256);
        // `exp` is validated when present but not required
        validation.required_spec_claims.clear();
        validation.validate_aud = false;

        Self {
            encoding_key: Arc::new(EncodingKey::from_secret(secret)),
            decoding_key: Arc::new(DecodingKey::from_secret(secret)),
            validation,
        }
    }
}

impl fmt::Debug for Hs256Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hs256Authority")
            .field("algorithm", &Algorithm::HS256)
            .finish_non_exhaustive()
    }
}

impl TokenAuthority for Hs256Authority {
    fn sign(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| Error::internal(format!("unable to sign token: {e}")))
    }

    fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token validation failed");
                Error::forbidden(NOT_AUTHENTICATED)
            })
    }
}

/// Token authentication configuration
#[derive(Debug, Clone)]
pub struct TokenAuthConfig {
    /// Header name to extract the token from (default: "Authorization")
    pub header_name: header::HeaderName,

    /// Token prefix (default: "Token ")
    pub token_prefix: String,

    /// Claim copied into the context (default: "email")
    pub claim: String,

    /// Context key the claim is stored under (default: same as `claim`)
    pub context_key: String,
}

impl Default for TokenAuthConfig {
    fn default() -> Self {
        Self {
            header_name: header::AUTHORIZATION,
            token_prefix: "Token ".to_string(),
            claim: "email".to_string(),
            context_key: "email".to_string(),
        }
    }
}

/// Token authentication middleware
#[derive(Clone)]
pub struct TokenAuthentication {
    config: Arc<TokenAuthConfig>,
    authority: Arc<dyn TokenAuthority>,
}

impl TokenAuthentication {
    /// Create the middleware with default configuration
    pub fn new(authority: Arc<dyn TokenAuthority>) -> Self {
        Self::with_config(authority, TokenAuthConfig::default())
    }

    /// Create the middleware with custom configuration
    pub fn with_config(authority: Arc<dyn TokenAuthority>, config: TokenAuthConfig) -> Self {
        Self {
            config: Arc::new(config),
            authority,
        }
    }

    /// Extract token from request
    fn extract_token<'a>(&self, req: &'a Parts) -> Option<&'a str> {
        req.headers
            .get(&self.config.header_name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix(self.config.token_prefix.as_str()))
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    fn claim_value(&self, claims: &Claims) -> Option<ContextValue> {
        match claims.get(&self.config.claim)? {
            Value::String(s) => Some(ContextValue::Str(s.clone())),
            Value::Number(n) => n.as_i64().map(ContextValue::Int),
            _ => None,
        }
    }
}

impl fmt::Debug for TokenAuthentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuthentication")
            .field("config", &self.config)
            .field("authority", &self.authority)
            .finish()
    }
}

#[async_trait]
impl Middleware for TokenAuthentication {
    async fn call(&self, ctx: Context, req: &Parts, next: Next) -> Result<Context> {
        let path = req.uri.path();

        let Some(token) = self.extract_token(req) else {
            tracing::debug!(path = %path, request_id = ctx.request_id(), "Missing authentication token");
            return Err(Error::forbidden(NOT_AUTHENTICATED));
        };

        let claims = self
            .authority
            .verify(token)
            .map_err(|_| Error::forbidden(NOT_AUTHENTICATED))?;

        let Some(value) = self.claim_value(&claims) else {
            tracing::debug!(
                path = %path,
                claim = %self.config.claim,
                "Token lacks the identity claim"
            );
            return Err(Error::forbidden(NOT_AUTHENTICATED));
        };

        tracing::debug!(path = %path, request_id = ctx.request_id(), "Authentication successful");
        next.run(ctx.with_value(self.config.context_key.clone(), value), req)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::Chain;
    use http::Request;
    use serde_json::json;

    fn claims(value: Value) -> Claims {
        match value {
            Value::Object(map) => map,
            _ => panic!("claims must be an object"),
        }
    }

    fn parts(authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/user");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn chain(authority: &Arc<Hs256Authority>) -> Chain {
        Chain::compose([
            Arc::new(TokenAuthentication::new(authority.clone())) as Arc<dyn Middleware>,
        ])
    }

    #[tokio::test]
    async fn test_token_auth_success() {
        let authority = Arc::new(Hs256Authority::new("test_key_123"));
        let token = authority
            .sign(&claims(json!({ "email": "jake@jake.jake" })))
            .unwrap();

        let ctx = chain(&authority)
            .run(Context::new(), &parts(Some(&format!("Token {token}"))))
            .await
            .unwrap();

        assert_eq!(ctx.value::<String>("email").unwrap(), "jake@jake.jake");
    }

    #[tokio::test]
    async fn test_token_auth_missing_header() {
        let authority = Arc::new(Hs256Authority::new("test_key_123"));

        let err = chain(&authority)
            .run(Context::new(), &parts(None))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Forbidden(_)));
        assert_eq!(err.to_string(), NOT_AUTHENTICATED);
    }

    #[tokio::test]
    async fn test_token_auth_wrong_prefix_or_empty() {
        let authority = Arc::new(Hs256Authority::new("test_key_123"));
        let token = authority.sign(&claims(json!({ "email": "a@b.c" }))).unwrap();

        for header in [format!("Bearer {token}"), "Token ".to_string(), "Token    ".to_string()] {
            let err = chain(&authority)
                .run(Context::new(), &parts(Some(&header)))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Forbidden(_)), "header {header:?}");
        }
    }

    #[tokio::test]
    async fn test_token_auth_bad_signature() {
        let issuer = Hs256Authority::new("other-secret");
        let token = issuer.sign(&claims(json!({ "email": "a@b.c" }))).unwrap();
        let authority = Arc::new(Hs256Authority::new("test_key_123"));

        let err = chain(&authority)
            .run(Context::new(), &parts(Some(&format!("Token {token}"))))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_token_auth_missing_claim() {
        let authority = Arc::new(Hs256Authority::new("test_key_123"));
        let token = authority.sign(&claims(json!({ "sub": "42" }))).unwrap();

        let err = chain(&authority)
            .run(Context::new(), &parts(Some(&format!("Token {token}"))))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let authority = Hs256Authority::new("test_key_123");
        let token = authority
            .sign(&claims(json!({ "email": "a@b.c", "exp": 1_000_000 })))
            .unwrap();

        assert!(authority.verify(&token).is_err());
    }

    #[derive(Debug)]
    struct FixedAuthority;

    impl TokenAuthority for FixedAuthority {
        fn sign(&self, _claims: &Claims) -> Result<String> {
            Ok("fixed".to_string())
        }

        fn verify(&self, token: &str) -> Result<Claims> {
            if token == "fixed" {
                Ok(claims(json!({ "user_id": 42 })))
            } else {
                Err(Error::internal("unknown token"))
            }
        }
    }

    #[tokio::test]
    async fn test_custom_claim_and_authority_errors_become_forbidden() {
        let config = TokenAuthConfig {
            claim: "user_id".to_string(),
            context_key: "uid".to_string(),
            ..Default::default()
        };
        let auth = TokenAuthentication::with_config(Arc::new(FixedAuthority), config);
        let chain = Chain::compose([Arc::new(auth) as Arc<dyn Middleware>]);

        let ctx = chain
            .run(Context::new(), &parts(Some("Token fixed")))
            .await
            .unwrap();
        assert_eq!(ctx.value::<i64>("uid").unwrap(), 42);

        let err = chain
            .run(Context::new(), &parts(Some("Token other")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }
}
