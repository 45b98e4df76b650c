//! Transport seam between the client and the network.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::config::CredentialMode;
use crate::{HttpClientConfig, HttpClientError, PendingRequest, RawResponse, Result};

/// Sends a fully prepared request and returns whatever the server answered.
///
/// Implementations return `Err` only when no response was received at all
/// (connection failure, timeout); every HTTP status, including errors, is an
/// `Ok` response.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request once.
    async fn send(&self, request: &PendingRequest) -> Result<RawResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: &PendingRequest) -> Result<RawResponse> {
        (**self).send(request).await
    }
}

/// Transport backed by a pooled `reqwest` client.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
    base_url: Arc<str>,
}

impl ReqwestTransport {
    /// Build a transport from the client configuration.
    ///
    /// Cookie mode enables the cookie jar so session cookies set by the auth
    /// endpoints travel with every subsequent request.
    pub fn new(config: &HttpClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent);

        if config.gzip {
            builder = builder.gzip(true);
        }
        if config.brotli {
            builder = builder.brotli(true);
        }
        if config.credential_mode == CredentialMode::Cookie {
            builder = builder.cookie_store(true);
        }

        Ok(Self::with_client(builder.build()?, config.base_url.as_str()))
    }

    /// Wrap an existing reqwest client.
    pub fn with_client(inner: reqwest::Client, base_url: &str) -> Self {
        Self {
            inner,
            base_url: Arc::from(base_url),
        }
    }

    /// Get the underlying reqwest client.
    pub fn inner(&self) -> &reqwest::Client {
        &self.inner
    }

    /// Get the base URL requests are resolved against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &PendingRequest) -> Result<RawResponse> {
        let url = request.url(&self.base_url)?;

        debug!(
            method = %request.method(),
            url = %url,
            retried = request.is_retried(),
            "Sending HTTP request"
        );

        let mut builder = self
            .inner
            .request(request.method().clone(), url)
            .headers(request.headers().clone());

        if let Some(body) = request.body() {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| HttpClientError::Network(e.to_string()))?;

        RawResponse::from_reqwest(response).await
    }
}
