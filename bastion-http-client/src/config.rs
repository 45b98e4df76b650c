//! HTTP client configuration.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::HttpClientError;

/// How the credential travels with each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialMode {
    /// The server sets and reads a session cookie.
    #[default]
    Cookie,
    /// `Authorization: Bearer <token>` from the credential store.
    BearerToken,
}

impl FromStr for CredentialMode {
    type Err = HttpClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cookie" => Ok(Self::Cookie),
            "bearer-token" | "bearer" | "token" => Ok(Self::BearerToken),
            other => Err(HttpClientError::Config(format!(
                "unknown credential mode: {}",
                other
            ))),
        }
    }
}

/// Paths of the authentication endpoints, relative to the base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthEndpoints {
    pub validate: String,
    pub refresh: String,
    pub login: String,
    pub register: String,
    pub logout: String,
    pub forgot_password: String,
    pub verify_otp: String,
    pub reset_password: String,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self {
            validate: "/auth/validate/token".to_string(),
            refresh: "/auth/refresh/token".to_string(),
            login: "/auth/login".to_string(),
            register: "/auth/register".to_string(),
            logout: "/auth/logout".to_string(),
            forgot_password: "/auth/forgot-password".to_string(),
            verify_otp: "/auth/verify-otp".to_string(),
            reset_password: "/auth/reset-password".to_string(),
        }
    }
}

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Origin plus versioned path prefix, e.g. `http://localhost:8080/api/v1`.
    pub base_url: String,
    /// Default request timeout.
    pub timeout: Duration,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// How credentials are sent.
    pub credential_mode: CredentialMode,
    /// When false, 401/403 are treated like any other error status.
    pub auth_enforced: bool,
    /// Where to send the user when recovery fails.
    pub login_url: String,
    /// Authentication endpoint paths.
    pub auth_endpoints: AuthEndpoints,
    /// Share one in-flight refresh between concurrently failing requests.
    pub coalesce_refresh: bool,
    /// Default headers for all requests.
    pub default_headers: Vec<(String, String)>,
    /// User agent string.
    pub user_agent: String,
    /// Enable gzip compression.
    pub gzip: bool,
    /// Enable brotli compression.
    pub brotli: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/v1".to_string(),
            timeout: Duration::from_millis(10_000),
            connect_timeout: Duration::from_secs(10),
            credential_mode: CredentialMode::default(),
            auth_enforced: true,
            login_url: "http://localhost:3000/login".to_string(),
            auth_endpoints: AuthEndpoints::default(),
            coalesce_refresh: true,
            default_headers: Vec::new(),
            user_agent: format!("bastion-http-client/{}", env!("CARGO_PKG_VERSION")),
            gzip: true,
            brotli: true,
        }
    }
}

impl HttpClientConfig {
    /// Create a new configuration builder.
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }

    /// Whether the bearer header is attached from the credential store.
    pub fn uses_bearer_token(&self) -> bool {
        self.credential_mode == CredentialMode::BearerToken
    }
}

/// Builder for HTTP client configuration.
#[derive(Debug, Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL (origin and versioned API prefix).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set the default request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the request timeout in milliseconds.
    pub fn timeout_ms(self, millis: u64) -> Self {
        self.timeout(Duration::from_millis(millis))
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set how credentials travel with requests.
    pub fn credential_mode(mut self, mode: CredentialMode) -> Self {
        self.config.credential_mode = mode;
        self
    }

    /// Enable or disable 401/403 handling.
    pub fn auth_enforced(mut self, enforced: bool) -> Self {
        self.config.auth_enforced = enforced;
        self
    }

    /// Set the login page URL used for redirects.
    pub fn login_url(mut self, url: impl Into<String>) -> Self {
        self.config.login_url = url.into();
        self
    }

    /// Set the authentication endpoint paths.
    pub fn auth_endpoints(mut self, endpoints: AuthEndpoints) -> Self {
        self.config.auth_endpoints = endpoints;
        self
    }

    /// Enable or disable coalescing of concurrent refreshes.
    pub fn coalesce_refresh(mut self, enable: bool) -> Self {
        self.config.coalesce_refresh = enable;
        self
    }

    /// Add a default header for all requests.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.push((name.into(), value.into()));
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Enable or disable gzip compression.
    pub fn gzip(mut self, enable: bool) -> Self {
        self.config.gzip = enable;
        self
    }

    /// Enable or disable brotli compression.
    pub fn brotli(mut self, enable: bool) -> Self {
        self.config.brotli = enable;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}
