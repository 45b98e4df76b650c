//! Request and response interceptors.

use async_trait::async_trait;
use http::HeaderValue;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use std::sync::Arc;

use crate::{CredentialStore, PendingRequest, RawResponse, Result};

/// Header carrying the signed-in username for server-side audit logs.
pub const ACTOR_HEADER: &str = "actor";

/// Request-stage interceptor.
#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    /// Intercept and optionally modify the request.
    async fn intercept(&self, request: PendingRequest) -> Result<PendingRequest>;
}

/// Response-stage interceptor.
///
/// Runs on every response that arrived, success or error, before the
/// response is classified.
#[async_trait]
pub trait ResponseInterceptor: Send + Sync {
    /// Intercept and optionally modify the response.
    async fn intercept(&self, response: RawResponse) -> Result<RawResponse>;
}

/// Adds `Content-Type` (unless the caller set one) and `Accept` JSON headers.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonHeadersInterceptor;

#[async_trait]
impl RequestInterceptor for JsonHeadersInterceptor {
    async fn intercept(&self, mut request: PendingRequest) -> Result<PendingRequest> {
        let headers = request.headers_mut();
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Ok(request)
    }
}

/// Adds fixed headers configured on the client.
#[derive(Debug, Clone)]
pub struct DefaultHeadersInterceptor {
    headers: http::HeaderMap,
}

impl DefaultHeadersInterceptor {
    /// Create from name/value pairs, skipping invalid entries.
    pub fn new(pairs: &[(String, String)]) -> Self {
        let mut headers = http::HeaderMap::new();
        for (name, value) in pairs {
            match (
                http::HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::warn!(header = %name, "Ignoring invalid default header"),
            }
        }
        Self { headers }
    }
}

#[async_trait]
impl RequestInterceptor for DefaultHeadersInterceptor {
    async fn intercept(&self, mut request: PendingRequest) -> Result<PendingRequest> {
        let headers = request.headers_mut();
        for (name, value) in &self.headers {
            if !headers.contains_key(name) {
                headers.insert(name.clone(), value.clone());
            }
        }
        Ok(request)
    }
}

/// Attaches the stored access token as a bearer header.
///
/// A missing token is not an error: the request goes out with whatever
/// `Authorization` the caller set, or none, and the server's 401 drives
/// recovery. The header is rebuilt on every pass, so a replayed request
/// picks up a refreshed token.
pub struct BearerAuthInterceptor {
    store: Arc<dyn CredentialStore>,
}

impl BearerAuthInterceptor {
    /// Create an interceptor reading from `store`.
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RequestInterceptor for BearerAuthInterceptor {
    async fn intercept(&self, mut request: PendingRequest) -> Result<PendingRequest> {
        let credentials = self.store.get();
        let headers = request.headers_mut();

        if let Some(value) = credentials
            .access_token
            .as_deref()
            .and_then(|token| HeaderValue::try_from(format!("Bearer {}", token)).ok())
        {
            headers.insert(AUTHORIZATION, value);
        }

        if let Some(actor) = credentials
            .username
            .as_deref()
            .and_then(|name| HeaderValue::try_from(name).ok())
        {
            headers.insert(ACTOR_HEADER, actor);
        }

        Ok(request)
    }
}

/// Logging interceptor that logs requests and responses.
#[derive(Debug, Default, Clone)]
pub struct LoggingInterceptor {
    log_headers: bool,
}

impl LoggingInterceptor {
    /// Create a new logging interceptor.
    pub fn new() -> Self {
        Self { log_headers: false }
    }

    /// Enable logging of headers. `Authorization` values are never logged.
    pub fn with_headers(mut self) -> Self {
        self.log_headers = true;
        self
    }

    fn trace_headers(&self, kind: &str, headers: &http::HeaderMap) {
        if !self.log_headers {
            return;
        }
        for (name, value) in headers {
            if name == AUTHORIZATION {
                tracing::trace!(kind, header = %name, "<redacted>");
            } else {
                tracing::trace!(kind, header = %name, value = ?value, "HTTP header");
            }
        }
    }
}

#[async_trait]
impl RequestInterceptor for LoggingInterceptor {
    async fn intercept(&self, request: PendingRequest) -> Result<PendingRequest> {
        tracing::debug!(
            method = %request.method(),
            path = %request.path(),
            retried = request.is_retried(),
            "Dispatching request"
        );
        self.trace_headers("request", request.headers());
        Ok(request)
    }
}

#[async_trait]
impl ResponseInterceptor for LoggingInterceptor {
    async fn intercept(&self, response: RawResponse) -> Result<RawResponse> {
        tracing::debug!(status = response.status(), "Received HTTP response");
        self.trace_headers("response", response.headers());
        Ok(response)
    }
}
