//! Failure classification and the 401 recovery protocol.
//!
//! A failed attempt is classified first. Only a `401` on a request that has
//! not been replayed yet enters recovery:
//!
//! 1. validate the current credential;
//! 2. on `TOKEN_INVALID`, refresh it (bearer mode stores the new tokens);
//! 3. replay the request once, marked as retried.
//!
//! Anything that cannot be recovered clears the credential store and
//! redirects to the login page.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::error::REDIRECTING_MESSAGE;
use crate::{
    AuthCollaborator, CredentialMode, CredentialStore, Credentials, HttpClientError, Navigator,
    PendingRequest, RawResponse, ResponseEnvelope, Result, TokenStatus,
};

/// Final result of a call, as seen by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The call finished, successfully or not.
    Resolved(ResponseEnvelope),
    /// Recovery gave up and the user was sent to the login page.
    Redirecting,
}

impl Outcome {
    pub fn is_redirecting(&self) -> bool {
        matches!(self, Self::Redirecting)
    }

    /// Collapse into an envelope; a redirect becomes a failure envelope.
    pub fn into_envelope(self) -> ResponseEnvelope {
        match self {
            Self::Resolved(envelope) => envelope,
            Self::Redirecting => ResponseEnvelope::failure(REDIRECTING_MESSAGE),
        }
    }
}

/// What to do with the result of one attempt.
#[derive(Debug)]
pub enum Classification {
    /// 2xx, normalized.
    Resolved(ResponseEnvelope),
    /// Final failure.
    Rejected(HttpClientError),
    /// `401` eligible for recovery; carries the request to replay.
    Recover(PendingRequest),
}

/// Classify the result of one attempt.
///
/// Checks run in a fixed order: no response, status `0`, missing request
/// context, then (only when `auth_enforced`) `403` and `401`, and finally
/// generic error mapping.
pub fn classify(
    result: Result<RawResponse>,
    request: Option<PendingRequest>,
    auth_enforced: bool,
) -> Classification {
    let response = match result {
        Ok(response) if response.is_success() => {
            return Classification::Resolved(ResponseEnvelope::from_success_body(
                response.bytes(),
            ));
        }
        Ok(response) => response,
        Err(e) => return Classification::Rejected(e),
    };

    if response.status() == 0 {
        return Classification::Rejected(HttpClientError::Cors);
    }

    let Some(request) = request else {
        return Classification::Rejected(HttpClientError::MalformedRequestContext);
    };

    if auth_enforced {
        match response.status() {
            403 => return Classification::Rejected(HttpClientError::PermissionDenied),
            401 if !request.is_retried() => return Classification::Recover(request),
            401 => {
                let message = response
                    .server_error()
                    .unwrap_or_else(|| crate::error::status_message(401));
                return Classification::Rejected(HttpClientError::Unauthenticated(message));
            }
            _ => {}
        }
    }

    Classification::Rejected(HttpClientError::server(
        response.status(),
        response.server_error(),
    ))
}

/// Serializes refreshes so concurrent 401s share one.
///
/// The generation advances after every refresh attempt. A recovery that saw
/// generation `n` before validating and finds a newer generation once it
/// holds the gate knows someone else already refreshed, and reuses that
/// result: a success is retried, a failure has already redirected.
#[derive(Debug, Default)]
pub struct RefreshGate {
    lock: Mutex<()>,
    generation: AtomicU64,
    failed: AtomicU64,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }

    fn advance(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    fn fail(&self) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.failed.store(generation, Ordering::Release);
    }

    /// The latest refresh attempt failed.
    fn last_failed(&self) -> bool {
        let generation = self.generation();
        generation != 0 && self.failed.load(Ordering::Acquire) == generation
    }
}

enum RefreshResult {
    Refreshed,
    Failed,
    /// A concurrent refresh failed and already redirected.
    FailedElsewhere,
}

/// Next step after a recovery attempt.
#[derive(Debug)]
pub enum RecoveryStep {
    /// Replay this request (already marked as retried).
    Retry(PendingRequest),
    /// Redirected to login; abandon the request.
    Redirect,
}

/// The validate → refresh-or-redirect → retry-once sequence.
pub struct RecoveryProtocol {
    mode: CredentialMode,
    auth: Arc<dyn AuthCollaborator>,
    store: Arc<dyn CredentialStore>,
    navigator: Arc<dyn Navigator>,
    login_url: String,
    gate: Option<RefreshGate>,
}

impl RecoveryProtocol {
    pub fn new(
        mode: CredentialMode,
        auth: Arc<dyn AuthCollaborator>,
        store: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
        login_url: impl Into<String>,
    ) -> Self {
        Self {
            mode,
            auth,
            store,
            navigator,
            login_url: login_url.into(),
            gate: Some(RefreshGate::new()),
        }
    }

    /// Let every failing request refresh on its own.
    pub fn without_coalescing(mut self) -> Self {
        self.gate = None;
        self
    }

    /// Run recovery for a request that just got a `401`.
    pub async fn recover(&self, mut request: PendingRequest) -> RecoveryStep {
        let generation = self.gate.as_ref().map(RefreshGate::generation);
        let credentials = self.store.get();

        if self.mode == CredentialMode::BearerToken && !credentials.has_token_pair() {
            return self.redirect("no stored token pair");
        }

        match self.auth.validate(&credentials).await {
            TokenStatus::Valid => {
                debug!(path = %request.path(), "Credential still valid, retrying");
            }
            TokenStatus::Invalid => match self.refresh(&credentials, generation).await {
                RefreshResult::Refreshed => {
                    debug!(path = %request.path(), "Credential refreshed, retrying");
                }
                RefreshResult::Failed => return self.redirect("refresh failed"),
                RefreshResult::FailedElsewhere => {
                    debug!(path = %request.path(), "Concurrent refresh failed, abandoning request");
                    return RecoveryStep::Redirect;
                }
            },
            TokenStatus::Unknown(detail) => {
                debug!(detail = %detail, "Unexpected validation result");
                return self.redirect("unexpected validation result");
            }
        }

        request.mark_retried();
        RecoveryStep::Retry(request)
    }

    async fn refresh(&self, credentials: &Credentials, seen: Option<u64>) -> RefreshResult {
        let Some(gate) = &self.gate else {
            return if self.refresh_now(credentials).await {
                RefreshResult::Refreshed
            } else {
                RefreshResult::Failed
            };
        };

        let _guard = gate.acquire().await;
        if Some(gate.generation()) != seen {
            if gate.last_failed() {
                return RefreshResult::FailedElsewhere;
            }
            debug!("Reusing refresh completed by a concurrent request");
            return RefreshResult::Refreshed;
        }

        if self.refresh_now(credentials).await {
            gate.advance();
            RefreshResult::Refreshed
        } else {
            gate.fail();
            RefreshResult::Failed
        }
    }

    async fn refresh_now(&self, credentials: &Credentials) -> bool {
        let Some(session) = self.auth.refresh(credentials.refresh_token.as_deref()).await else {
            return false;
        };

        if self.mode == CredentialMode::BearerToken {
            let Some(access_token) = session.access_token else {
                warn!("Refresh response carried no access token");
                return false;
            };
            let mut updated = self.store.get();
            updated.access_token = Some(access_token);
            if let Some(refresh_token) = session.refresh_token {
                updated.refresh_token = Some(refresh_token);
            }
            self.store.set(updated);
        }

        true
    }

    fn redirect(&self, reason: &str) -> RecoveryStep {
        warn!(reason, login_url = %self.login_url, "Unable to recover session");
        self.store.clear();
        self.navigator.redirect(&self.login_url);
        RecoveryStep::Redirect
    }
}
