//! Settings loading from the environment, `.env` files and TOML.
//!
//! Recognized variables (with the default `BASTION` prefix):
//!
//! - `BASTION_ENV` - `local`, `staging` or `production`
//! - `BASTION_API_BASE_URL` - API origin, e.g. `https://api.example.com`
//! - `BASTION_API_PATH` - versioned prefix, e.g. `/api/v1`
//! - `BASTION_DOMAIN` - console origin; the login page is `<domain>/login`
//! - `BASTION_TIMEOUT_MS` - request timeout in milliseconds
//! - `BASTION_CREDENTIAL_MODE` - `cookie` or `bearer-token`
//! - `BASTION_AUTH_ENFORCED` - `true` / `false`
//! - `BASTION_COALESCE_REFRESH` - `true` / `false`

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;

use crate::config::{AuthEndpoints, CredentialMode, HttpClientConfig};
use crate::{HttpClientError, Result};

/// Default environment variable prefix.
pub const ENV_PREFIX: &str = "BASTION";

/// Deployment environment presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl Environment {
    /// Default API origin for this environment.
    pub fn api_base_url(&self) -> &'static str {
        match self {
            Self::Local | Self::Staging | Self::Production => "http://localhost:8080",
        }
    }

    /// Default console origin for this environment.
    pub fn domain(&self) -> &'static str {
        match self {
            Self::Local | Self::Staging | Self::Production => "http://localhost:3000",
        }
    }
}

impl FromStr for Environment {
    type Err = HttpClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "dev" | "development" => Ok(Self::Local),
            "staging" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            other => Err(HttpClientError::Config(format!(
                "unknown environment: {}",
                other
            ))),
        }
    }
}

/// Environment variable loader
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    /// Create a new environment loader
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Load a specific environment variable, `None` when unset
    pub fn load_var(&self, key: &str) -> Option<String> {
        let full_key = if let Some(ref prefix) = self.prefix {
            format!("{}_{}", prefix, key.to_uppercase())
        } else {
            key.to_uppercase()
        };

        env::var(&full_key).ok().filter(|v| !v.trim().is_empty())
    }

    /// Load and parse a variable, failing on malformed values
    pub fn parse_var<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.load_var(key) {
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
                HttpClientError::Config(format!("invalid value for {}: {}", key, e))
            }),
            None => Ok(None),
        }
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(Some(ENV_PREFIX.to_string()))
    }
}

/// Serializable client settings.
///
/// Unset fields fall back to the [`Environment`] preset or to
/// [`HttpClientConfig::default`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub environment: Environment,
    pub api_base_url: Option<String>,
    pub api_path: Option<String>,
    pub domain: Option<String>,
    pub timeout_ms: Option<u64>,
    pub credential_mode: Option<CredentialMode>,
    pub auth_enforced: Option<bool>,
    pub coalesce_refresh: Option<bool>,
    pub auth_endpoints: Option<AuthEndpoints>,
}

impl ClientSettings {
    /// Parse settings from TOML text.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).map_err(|e| HttpClientError::Config(e.to_string()))
    }

    /// Read settings from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Read settings from `BASTION_*` variables.
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::default();
        settings.apply_env(&EnvLoader::default())?;
        Ok(settings)
    }

    /// Load a `.env` file (if present) and then read the environment.
    pub fn from_dotenv(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| HttpClientError::Config(e.to_string()))?;
            }
            None => {
                dotenvy::dotenv().ok();
            }
        }
        Self::from_env()
    }

    /// Override fields with any variables set in the environment.
    pub fn apply_env(&mut self, loader: &EnvLoader) -> Result<()> {
        if let Some(environment) = loader.parse_var::<Environment>("ENV")? {
            self.environment = environment;
        }
        if let Some(url) = loader.load_var("API_BASE_URL") {
            self.api_base_url = Some(url);
        }
        if let Some(path) = loader.load_var("API_PATH") {
            self.api_path = Some(path);
        }
        if let Some(domain) = loader.load_var("DOMAIN") {
            self.domain = Some(domain);
        }
        if let Some(timeout) = loader.parse_var::<u64>("TIMEOUT_MS")? {
            self.timeout_ms = Some(timeout);
        }
        if let Some(mode) = loader.parse_var::<CredentialMode>("CREDENTIAL_MODE")? {
            self.credential_mode = Some(mode);
        }
        if let Some(enforced) = loader.parse_var::<bool>("AUTH_ENFORCED")? {
            self.auth_enforced = Some(enforced);
        }
        if let Some(coalesce) = loader.parse_var::<bool>("COALESCE_REFRESH")? {
            self.coalesce_refresh = Some(coalesce);
        }
        Ok(())
    }

    /// Resolve into a client configuration.
    pub fn into_config(self) -> Result<HttpClientConfig> {
        let origin = self
            .api_base_url
            .unwrap_or_else(|| self.environment.api_base_url().to_string());
        let path = self.api_path.unwrap_or_else(|| "/api/v1".to_string());
        let base_url = format!(
            "{}/{}",
            origin.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url::Url::parse(&base_url)
            .map_err(|e| HttpClientError::Config(format!("invalid base URL {}: {}", base_url, e)))?;

        let domain = self
            .domain
            .unwrap_or_else(|| self.environment.domain().to_string());

        let defaults = HttpClientConfig::default();
        let mut builder = HttpClientConfig::builder()
            .base_url(base_url.trim_end_matches('/'))
            .login_url(format!("{}/login", domain.trim_end_matches('/')))
            .credential_mode(self.credential_mode.unwrap_or(defaults.credential_mode))
            .auth_enforced(self.auth_enforced.unwrap_or(defaults.auth_enforced))
            .coalesce_refresh(self.coalesce_refresh.unwrap_or(defaults.coalesce_refresh));

        if let Some(timeout) = self.timeout_ms {
            builder = builder.timeout_ms(timeout);
        }
        if let Some(endpoints) = self.auth_endpoints {
            builder = builder.auth_endpoints(endpoints);
        }

        Ok(builder.build())
    }
}

impl HttpClientConfig {
    /// Build a configuration from `BASTION_*` environment variables.
    pub fn from_env() -> Result<Self> {
        ClientSettings::from_env()?.into_config()
    }
}
