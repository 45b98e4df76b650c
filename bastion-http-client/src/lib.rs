//! # Bastion HTTP Client
//!
//! The HTTP client behind the Bastion admin console. Every call resolves to a
//! uniform [`ResponseEnvelope`], and a single authorization failure per
//! request is recovered transparently.
//!
//! ## Features
//!
//! - **Envelope normalization**: 2xx bodies are wrapped as `{ success, data }`
//!   unless the server already sent an envelope; failures become
//!   `{ success: false, error }`
//! - **Failure classification**: network, CORS, permission (403),
//!   unauthenticated (401) and server errors
//! - **Recovery**: on 401, validate the credential, refresh it if needed,
//!   and replay the request exactly once; otherwise redirect to login
//! - **Credential modes**: session cookies or bearer tokens from an injected
//!   [`CredentialStore`]
//! - **Pipeline**: ordered request/response interceptor stages
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bastion_http_client::{AuthenticatedHttpClient, HttpClientConfig};
//! use serde_json::Value;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AuthenticatedHttpClient::new(HttpClientConfig::default())?;
//!
//!     let users = client.get("/users").query(&[("page", "1")]).send::<Value>().await;
//!     if !users.success {
//!         eprintln!("failed: {}", users.error.unwrap_or_default());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Bearer Tokens
//!
//! ```rust,no_run
//! use bastion_http_client::{
//!     AuthApi, AuthenticatedHttpClient, CredentialMode, FileCredentialStore, HttpClientConfig,
//!     LoginIdentifier,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HttpClientConfig::builder()
//!         .base_url("https://console.example.com/api/v1")
//!         .credential_mode(CredentialMode::BearerToken)
//!         .login_url("https://console.example.com/login")
//!         .build();
//!
//!     let store = Arc::new(FileCredentialStore::open("credentials.json"));
//!     let auth = AuthApi::new(&config, store.clone())?;
//!     auth.login(LoginIdentifier::parse("alice@example.com"), "s3cret").await?;
//!
//!     let client = AuthenticatedHttpClient::builder(config)
//!         .credential_store(store)
//!         .auth(Arc::new(auth))
//!         .build()?;
//!
//!     let roles = client.get("/roles").send::<serde_json::Value>().await;
//!     println!("success: {}", roles.success);
//!     Ok(())
//! }
//! ```

mod auth;
mod client;
mod config;
mod credentials;
mod env;
mod envelope;
mod error;
mod interceptor;
mod navigator;
mod pipeline;
mod recovery;
mod request;
mod response;
mod transport;

#[cfg(test)]
mod testing;

pub use auth::{
    AuthApi, AuthCollaborator, LoginIdentifier, RefreshedSession, RegisterRequest, TokenStatus,
};
pub use client::{AuthenticatedHttpClient, ClientBuilder};
pub use config::{AuthEndpoints, CredentialMode, HttpClientConfig, HttpClientConfigBuilder};
pub use credentials::{CredentialStore, Credentials, FileCredentialStore, MemoryCredentialStore};
pub use env::{ClientSettings, EnvLoader, Environment};
pub use envelope::ResponseEnvelope;
pub use error::{
    CORS_ERROR_MESSAGE, HttpClientError, NETWORK_ERROR_MESSAGE, NO_ORIGINAL_REQUEST_MESSAGE,
    PERMISSION_DENIED_MESSAGE, REDIRECTING_MESSAGE, Result,
};
pub use interceptor::{
    ACTOR_HEADER, BearerAuthInterceptor, DefaultHeadersInterceptor, JsonHeadersInterceptor,
    LoggingInterceptor, RequestInterceptor, ResponseInterceptor,
};
pub use navigator::{FnNavigator, LogNavigator, Navigator};
pub use pipeline::Pipeline;
pub use recovery::{Classification, Outcome, RecoveryProtocol, RecoveryStep, RefreshGate, classify};
pub use request::{PendingRequest, RequestBuilder};
pub use response::RawResponse;
pub use transport::{ReqwestTransport, Transport};

// Re-export common types
pub use bytes::Bytes;
pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
pub use url::Url;

/// Prelude for common imports.
///
/// ```
/// use bastion_http_client::prelude::*;
/// ```
pub mod prelude {
    pub use crate::auth::{AuthApi, AuthCollaborator, LoginIdentifier, TokenStatus};
    pub use crate::client::AuthenticatedHttpClient;
    pub use crate::config::{CredentialMode, HttpClientConfig, HttpClientConfigBuilder};
    pub use crate::credentials::{CredentialStore, Credentials, MemoryCredentialStore};
    pub use crate::envelope::ResponseEnvelope;
    pub use crate::error::{HttpClientError, Result};
    pub use crate::navigator::Navigator;
    pub use crate::recovery::Outcome;
    pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
}
