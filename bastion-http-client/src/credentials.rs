//! Credential storage.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Tokens and identity of the signed-in user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
}

impl Credentials {
    /// Credentials holding only a token pair.
    pub fn with_tokens(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
            ..Default::default()
        }
    }

    /// Both tokens are present.
    pub fn has_token_pair(&self) -> bool {
        self.access_token.is_some() && self.refresh_token.is_some()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Where credentials live between requests.
///
/// Injected into the client so tests can use an in-memory store and
/// applications a persistent one.
pub trait CredentialStore: Send + Sync {
    /// Snapshot of the current credentials.
    fn get(&self) -> Credentials;

    /// Replace the stored credentials.
    fn set(&self, credentials: Credentials);

    /// Forget everything.
    fn clear(&self);
}

/// In-memory credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<Credentials>,
}

impl MemoryCredentialStore {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            inner: RwLock::new(credentials),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Credentials {
        self.inner.read().clone()
    }

    fn set(&self, credentials: Credentials) {
        *self.inner.write() = credentials;
    }

    fn clear(&self) {
        *self.inner.write() = Credentials::default();
    }
}

/// Credential store persisted as a JSON file.
///
/// Reads go to an in-memory cache loaded at construction. A missing or
/// unreadable file starts out empty; write failures are logged and the
/// cache stays authoritative for the running process.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    cache: RwLock<Credentials>,
}

impl FileCredentialStore {
    /// Open (or lazily create) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cache = Self::read(&path).unwrap_or_default();
        Self {
            path,
            cache: RwLock::new(cache),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(path: &Path) -> Option<Credentials> {
        let content = std::fs::read(path).ok()?;
        match serde_json::from_slice(&content) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring corrupt credential file");
                None
            }
        }
    }

    fn persist(&self, credentials: &Credentials) {
        let result = serde_json::to_vec_pretty(credentials)
            .map_err(std::io::Error::other)
            .and_then(|bytes| {
                if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&self.path, bytes)
            });

        if let Err(e) = result {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to persist credentials");
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Credentials {
        self.cache.read().clone()
    }

    fn set(&self, credentials: Credentials) {
        let mut cache = self.cache.write();
        self.persist(&credentials);
        *cache = credentials;
    }

    fn clear(&self) {
        let mut cache = self.cache.write();
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to remove credential file");
        }
        *cache = Credentials::default();
    }
}
