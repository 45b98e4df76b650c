//! Captured requests and the fluent request builder.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::recovery::Outcome;
use crate::{AuthenticatedHttpClient, HttpClientError, ResponseEnvelope, Result};

/// A request as issued by the caller, kept so it can be replayed.
///
/// The `retried` flag is set when the request is resubmitted after a
/// successful recovery; a retried request is never recovered again.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<Bytes>,
    retried: bool,
}

impl PendingRequest {
    /// Create a request for `path`, relative to the client's base URL.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            retried: false,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Whether this request is already the single allowed replay.
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    /// Mark this request as the replay of a recovered request.
    pub fn mark_retried(&mut self) {
        self.retried = true;
    }

    /// Append a query parameter.
    pub fn push_query(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.query.push((key.into(), value.into()));
    }

    /// Replace the body.
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = Some(body.into());
    }

    /// Resolve the full URL against `base_url`.
    ///
    /// The path is appended to the base (which carries the versioned API
    /// prefix) rather than URL-joined, so `/users` on
    /// `https://host/api/v1` targets `https://host/api/v1/users`. Absolute
    /// URLs are used as-is.
    pub fn url(&self, base_url: &str) -> Result<url::Url> {
        let raw = if self.path.starts_with("http://") || self.path.starts_with("https://") {
            self.path.clone()
        } else if self.path.is_empty() {
            base_url.to_string()
        } else {
            format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                self.path.trim_start_matches('/')
            )
        };

        let mut url =
            url::Url::parse(&raw).map_err(|e| HttpClientError::InvalidUrl(format!("{}: {}", raw, e)))?;

        if !self.query.is_empty() {
            let mut query_pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                query_pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }
}

/// HTTP request builder.
pub struct RequestBuilder<'a> {
    client: &'a AuthenticatedHttpClient,
    request: PendingRequest,
    error: Option<HttpClientError>,
}

impl<'a> RequestBuilder<'a> {
    /// Create a new request builder.
    pub(crate) fn new(client: &'a AuthenticatedHttpClient, method: Method, path: String) -> Self {
        Self {
            client,
            request: PendingRequest::new(method, path),
            error: None,
        }
    }

    /// Add a header to the request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            (Ok(name), Ok(value)) => {
                self.request.headers.insert(name, value);
            }
            _ => self.fail(HttpClientError::RequestBuild(format!(
                "invalid header: {}",
                name
            ))),
        }
        self
    }

    /// Add multiple headers to the request.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.request.headers.extend(headers);
        self
    }

    /// Add query parameters from any serializable map or struct.
    pub fn query<Q: Serialize + ?Sized>(mut self, params: &Q) -> Self {
        match serde_urlencoded::to_string(params) {
            Ok(encoded) => {
                for (key, value) in url::form_urlencoded::parse(encoded.as_bytes()) {
                    self.request.push_query(key, value);
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode query parameters");
                self.fail(HttpClientError::RequestBuild(e.to_string()));
            }
        }
        self
    }

    /// Set the request body as raw bytes.
    ///
    /// Pair with an explicit `Content-Type` header (e.g. multipart uploads);
    /// otherwise `application/json` is assumed.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.request.set_body(body);
        self
    }

    /// Set the request body as JSON.
    pub fn json<T: Serialize + ?Sized>(mut self, json: &T) -> Self {
        match serde_json::to_vec(json) {
            Ok(bytes) => {
                self.request.headers.insert(
                    http::header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                self.request.set_body(bytes);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize JSON body");
                self.fail(HttpClientError::Json(e.to_string()));
            }
        }
        self
    }

    fn fail(&mut self, error: HttpClientError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// The request as it will be sent.
    pub fn pending(&self) -> &PendingRequest {
        &self.request
    }

    /// Send the request, exposing whether the client redirected to login.
    pub async fn send_outcome(self) -> Outcome {
        if let Some(error) = self.error {
            return Outcome::Resolved(error.into());
        }
        self.client.dispatch(self.request).await
    }

    /// Send the request and decode the envelope payload.
    ///
    /// Never fails: every failure, including a redirect to login, resolves
    /// to an envelope with `success == false`.
    pub async fn send<T: DeserializeOwned>(self) -> ResponseEnvelope<T> {
        self.send_outcome().await.into_envelope().decode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_appends_to_versioned_base() {
        let request = PendingRequest::new(Method::GET, "/users");
        let url = request.url("https://console.example.com/api/v1/").unwrap();
        assert_eq!(url.as_str(), "https://console.example.com/api/v1/users");
    }

    #[test]
    fn test_url_with_query() {
        let mut request = PendingRequest::new(Method::GET, "roles");
        request.push_query("page", "2");
        request.push_query("search", "ad min");
        let url = request.url("http://localhost:8080/api/v1").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/v1/roles?page=2&search=ad+min"
        );
    }

    #[test]
    fn test_absolute_url_is_kept() {
        let request = PendingRequest::new(Method::GET, "https://other.example.com/health");
        let url = request.url("http://localhost:8080/api/v1").unwrap();
        assert_eq!(url.as_str(), "https://other.example.com/health");
    }

    #[test]
    fn test_invalid_base_url() {
        let request = PendingRequest::new(Method::GET, "/users");
        assert!(matches!(
            request.url("localhost"),
            Err(HttpClientError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_retry_flag() {
        let mut request = PendingRequest::new(Method::DELETE, "/orgs/7");
        assert!(!request.is_retried());
        request.mark_retried();
        assert!(request.is_retried());
        assert!(request.clone().is_retried());
    }
}
