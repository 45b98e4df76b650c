//! Redirect sink used when a session cannot be recovered.

use std::sync::Arc;

/// Sends the user to another page.
///
/// The client calls this exactly once when recovery gives up, after the
/// credential store has been cleared. Nothing else about the abandoned
/// request runs afterwards.
pub trait Navigator: Send + Sync {
    fn redirect(&self, url: &str);
}

/// Navigator that only logs the redirect.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn redirect(&self, url: &str) {
        tracing::warn!(target_url = %url, "Session could not be recovered, redirecting to login");
    }
}

/// Navigator backed by a closure, e.g. to hand the URL to a UI shell.
#[derive(Clone)]
pub struct FnNavigator {
    redirect: Arc<dyn Fn(&str) + Send + Sync>,
}

impl FnNavigator {
    pub fn new<F>(redirect: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self {
            redirect: Arc::new(redirect),
        }
    }
}

impl Navigator for FnNavigator {
    fn redirect(&self, url: &str) {
        tracing::info!(target_url = %url, "Redirecting");
        (self.redirect)(url);
    }
}
