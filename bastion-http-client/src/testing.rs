//! Fakes shared by the unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{
    AuthCollaborator, Credentials, HttpClientError, Navigator, PendingRequest, RawResponse,
    RefreshedSession, Result, TokenStatus, Transport,
};

/// Replies with queued responses in order and records every request.
pub(crate) struct ScriptedTransport {
    replies: Mutex<Vec<Result<RawResponse>>>,
    seen: Mutex<Vec<PendingRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new(mut replies: Vec<Result<RawResponse>>) -> Arc<Self> {
        replies.reverse();
        Arc::new(Self {
            replies: Mutex::new(replies),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn seen(&self) -> Vec<PendingRequest> {
        self.seen.lock().clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.seen.lock().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &PendingRequest) -> Result<RawResponse> {
        self.seen.lock().push(request.clone());
        self.replies
            .lock()
            .pop()
            .unwrap_or_else(|| Err(HttpClientError::Network("no reply scripted".into())))
    }
}

/// Auth collaborator with fixed answers and call counters.
pub(crate) struct FakeAuth {
    status: TokenStatus,
    session: Option<RefreshedSession>,
    pub(crate) validations: AtomicUsize,
    pub(crate) refreshes: AtomicUsize,
    pub(crate) refresh_tokens: Mutex<Vec<Option<String>>>,
}

impl FakeAuth {
    pub(crate) fn new(status: TokenStatus, session: Option<RefreshedSession>) -> Arc<Self> {
        Arc::new(Self {
            status,
            session,
            validations: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
            refresh_tokens: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn validations(&self) -> usize {
        self.validations.load(Ordering::SeqCst)
    }

    pub(crate) fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthCollaborator for FakeAuth {
    async fn validate(&self, _credentials: &Credentials) -> TokenStatus {
        self.validations.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.status.clone()
    }

    async fn refresh(&self, refresh_token: Option<&str>) -> Option<RefreshedSession> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.refresh_tokens
            .lock()
            .push(refresh_token.map(str::to_string));
        tokio::task::yield_now().await;
        self.session.clone()
    }
}

/// Navigator that remembers where it was sent.
#[derive(Default)]
pub(crate) struct RecordingNavigator {
    redirects: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub(crate) fn redirects(&self) -> Vec<String> {
        self.redirects.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, url: &str) {
        self.redirects.lock().push(url.to_string());
    }
}
