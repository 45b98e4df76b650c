//! Authentication API.
//!
//! [`AuthApi`] talks to the console's `/auth/*` endpoints over its own
//! transport, with no interceptors and no recovery, so a failing refresh can
//! never recurse back into the client that triggered it.

use async_trait::async_trait;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderValue, Method};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{AuthEndpoints, CredentialMode};
use crate::{
    CredentialStore, Credentials, HttpClientConfig, HttpClientError, PendingRequest, RawResponse,
    ReqwestTransport, Result, Transport,
};

/// Result of asking the server whether the current credential is usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    /// `TOKEN_VALID`
    Valid,
    /// `TOKEN_INVALID`, also reported when validation itself failed.
    Invalid,
    /// Any other answer.
    Unknown(String),
}

impl TokenStatus {
    /// Interpret the server's `detail` field.
    pub fn from_detail(detail: &str) -> Self {
        match detail {
            "TOKEN_VALID" => Self::Valid,
            "TOKEN_INVALID" => Self::Invalid,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Outcome of a successful refresh.
///
/// In cookie mode the server rotates the session cookie itself and the
/// tokens are usually absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshedSession {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// The two auth calls the recovery protocol depends on.
#[async_trait]
pub trait AuthCollaborator: Send + Sync {
    /// Check the current credential. Never fails; any internal failure is
    /// reported as [`TokenStatus::Invalid`].
    async fn validate(&self, credentials: &Credentials) -> TokenStatus;

    /// Obtain a fresh credential. `None` means the refresh failed.
    async fn refresh(&self, refresh_token: Option<&str>) -> Option<RefreshedSession>;
}

/// Username or email, as typed into the login form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginIdentifier {
    Username(String),
    Email(String),
}

impl LoginIdentifier {
    /// Treat input containing `@` as an email address.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.contains('@') {
            Self::Email(input.to_string())
        } else {
            Self::Username(input.to_string())
        }
    }
}

/// Registration form.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// Client for the authentication endpoints.
#[derive(Clone)]
pub struct AuthApi {
    transport: Arc<dyn Transport>,
    endpoints: AuthEndpoints,
    mode: CredentialMode,
    store: Arc<dyn CredentialStore>,
}

impl AuthApi {
    /// Build an auth client with its own reqwest transport.
    pub fn new(config: &HttpClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let transport = ReqwestTransport::new(config)?;
        Ok(Self::with_transport(config, Arc::new(transport), store))
    }

    /// Build an auth client on an existing transport.
    ///
    /// In cookie mode pass the same transport the main client uses, so both
    /// share one cookie jar.
    pub fn with_transport(
        config: &HttpClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            transport,
            endpoints: config.auth_endpoints.clone(),
            mode: config.credential_mode,
            store,
        }
    }

    pub fn endpoints(&self) -> &AuthEndpoints {
        &self.endpoints
    }

    fn request(&self, method: Method, path: &str, body: Option<&Value>) -> PendingRequest {
        let mut request = PendingRequest::new(method, path);
        let headers = request.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(body) = body {
            request.set_body(serde_json::to_vec(body).unwrap_or_default());
        }
        request
    }

    /// Send a form request, mapping error responses to `fallback`-backed errors.
    async fn call(&self, path: &str, body: Option<Value>, fallback: &str) -> Result<Value> {
        let request = self.request(Method::POST, path, body.as_ref());
        let response = self.transport.send(&request).await?;
        if response.is_success() {
            Ok(serde_json::from_slice(response.bytes()).unwrap_or(Value::Null))
        } else {
            Err(flow_error(&response, fallback))
        }
    }

    /// Sign in with a username or an email address.
    ///
    /// In bearer mode the returned tokens, username and email are stored. A
    /// response without an access token leaves the store untouched.
    pub async fn login(&self, identifier: LoginIdentifier, password: &str) -> Result<Value> {
        let (username, email) = match &identifier {
            LoginIdentifier::Username(name) => (Some(name.as_str()), None),
            LoginIdentifier::Email(email) => (None, Some(email.as_str())),
        };
        let body = json!({ "username": username, "email": email, "password": password });
        let response = self.call(&self.endpoints.login, Some(body), "Login failed").await?;

        if self.mode == CredentialMode::BearerToken {
            let data = response.get("data").unwrap_or(&response);
            match string_field(data, "access_token") {
                Some(access_token) => {
                    let user = data.get("user").unwrap_or(&Value::Null);
                    let identity = |field: &str, fallback: Option<&str>| {
                        string_field(user, field)
                            .or_else(|| string_field(data, field))
                            .or(fallback.map(str::to_string))
                    };
                    self.store.set(Credentials {
                        access_token: Some(access_token),
                        refresh_token: string_field(data, "refresh_token"),
                        username: identity("username", username),
                        email: identity("email", email),
                    });
                }
                None => warn!("Login response carried no access token"),
            }
        }

        debug!("Login succeeded");
        Ok(response)
    }

    /// Create an account.
    pub async fn register(&self, form: &RegisterRequest) -> Result<Value> {
        let body = serde_json::to_value(form)?;
        self.call(&self.endpoints.register, Some(body), "Registration failed")
            .await
    }

    /// Sign out. Local credentials are cleared even when the server call fails.
    pub async fn logout(&self) -> Option<Value> {
        let result = self.call(&self.endpoints.logout, None, "Logout failed").await;
        self.store.clear();
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "Logout request failed");
                None
            }
        }
    }

    /// Request a password-reset OTP.
    pub async fn forgot_password(&self, email: &str) -> Result<Value> {
        self.call(
            &self.endpoints.forgot_password,
            Some(json!({ "email": email })),
            "Failed to send OTP",
        )
        .await
    }

    /// Check a password-reset OTP.
    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<Value> {
        self.call(
            &self.endpoints.verify_otp,
            Some(json!({ "email": email, "otp": otp })),
            "Invalid OTP",
        )
        .await
    }

    /// Set a new password using a verified OTP.
    pub async fn reset_password(&self, email: &str, otp: &str, new_password: &str) -> Result<Value> {
        self.call(
            &self.endpoints.reset_password,
            Some(json!({ "email": email, "otp": otp, "new_password": new_password })),
            "Failed to reset password",
        )
        .await
    }
}

#[async_trait]
impl AuthCollaborator for AuthApi {
    async fn validate(&self, credentials: &Credentials) -> TokenStatus {
        let mut request = self.request(Method::GET, &self.endpoints.validate, None);
        if self.mode == CredentialMode::BearerToken
            && let Some(value) = credentials
                .access_token
                .as_deref()
                .and_then(|t| HeaderValue::try_from(format!("Bearer {}", t)).ok())
        {
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let response = match self.transport.send(&request).await {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                debug!(status = response.status(), "Token validation rejected");
                return TokenStatus::Invalid;
            }
            Err(e) => {
                debug!(error = %e, "Token validation failed");
                return TokenStatus::Invalid;
            }
        };

        let body: Value = response.json_body().unwrap_or(Value::Null);
        let detail = body
            .get("detail")
            .or_else(|| body.get("data").and_then(|d| d.get("detail")))
            .and_then(Value::as_str);

        match detail {
            Some(detail) => TokenStatus::from_detail(detail),
            None => TokenStatus::Unknown(String::new()),
        }
    }

    async fn refresh(&self, refresh_token: Option<&str>) -> Option<RefreshedSession> {
        let body = match (self.mode, refresh_token) {
            (CredentialMode::BearerToken, Some(token)) => Some(json!({ "refresh_token": token })),
            _ => None,
        };
        let request = self.request(Method::POST, &self.endpoints.refresh, body.as_ref());

        let response = match self.transport.send(&request).await {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                warn!(status = response.status(), "Token refresh rejected");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                return None;
            }
        };

        let body: Value = response.json_body().ok()?;
        let data = body.get("data").filter(|d| is_truthy(d))?;
        Some(RefreshedSession {
            access_token: string_field(data, "access_token"),
            refresh_token: string_field(data, "refresh_token"),
        })
    }
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn flow_error(response: &RawResponse, fallback: &str) -> HttpClientError {
    let message = response
        .server_detail()
        .or_else(|| response.server_error())
        .unwrap_or_else(|| fallback.to_string());
    HttpClientError::Server {
        status: response.status(),
        message,
    }
}
