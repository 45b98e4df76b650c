//! Authenticated HTTP client implementation.

use http::Method;
use std::sync::Arc;
use tracing::debug;

use crate::interceptor::{LoggingInterceptor, RequestInterceptor, ResponseInterceptor};
use crate::recovery::{Classification, Outcome, RecoveryProtocol, RecoveryStep, classify};
use crate::{
    AuthApi, AuthCollaborator, CredentialStore, HttpClientConfig, LogNavigator,
    MemoryCredentialStore, Navigator, PendingRequest, Pipeline, RequestBuilder, ReqwestTransport,
    Result, Transport,
};

/// HTTP client that normalizes every response into an envelope and recovers
/// from a single authorization failure per request.
#[derive(Clone)]
pub struct AuthenticatedHttpClient {
    config: Arc<HttpClientConfig>,
    transport: Arc<dyn Transport>,
    pipeline: Arc<Pipeline>,
    recovery: Arc<RecoveryProtocol>,
    store: Arc<dyn CredentialStore>,
}

impl AuthenticatedHttpClient {
    /// Create a client with an in-memory credential store, a logging
    /// navigator and the REST auth API.
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Start building a client with custom collaborators.
    pub fn builder(config: HttpClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Get the client configuration.
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Get the credential store shared with the auth collaborator.
    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Get the transport, e.g. to build an [`AuthApi`] sharing its cookie jar.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Create a GET request builder.
    pub fn get(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::GET, path.into())
    }

    /// Create a POST request builder.
    pub fn post(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::POST, path.into())
    }

    /// Create a PUT request builder.
    pub fn put(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::PUT, path.into())
    }

    /// Create a DELETE request builder.
    pub fn delete(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::DELETE, path.into())
    }

    /// Create a request builder with a custom method.
    pub fn request(&self, method: Method, path: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, method, path.into())
    }

    /// Send a request through the pipeline, recovering from a `401` at most once.
    pub(crate) async fn dispatch(&self, mut request: PendingRequest) -> Outcome {
        loop {
            let (sent, result) = self.pipeline.run(self.transport.as_ref(), request).await;

            match classify(result, sent, self.config.auth_enforced) {
                Classification::Resolved(envelope) => return Outcome::Resolved(envelope),
                Classification::Rejected(error) => {
                    debug!(error = %error, status = ?error.status_code(), "Request failed");
                    return Outcome::Resolved(error.into());
                }
                Classification::Recover(pending) => match self.recovery.recover(pending).await {
                    RecoveryStep::Retry(replay) => request = replay,
                    RecoveryStep::Redirect => return Outcome::Redirecting,
                },
            }
        }
    }
}

/// Builder wiring the client's collaborators.
pub struct ClientBuilder {
    config: HttpClientConfig,
    store: Option<Arc<dyn CredentialStore>>,
    navigator: Option<Arc<dyn Navigator>>,
    auth: Option<Arc<dyn AuthCollaborator>>,
    transport: Option<Arc<dyn Transport>>,
    request_stages: Vec<Arc<dyn RequestInterceptor>>,
    response_stages: Vec<Arc<dyn ResponseInterceptor>>,
    logging: Option<LoggingInterceptor>,
}

impl ClientBuilder {
    fn new(config: HttpClientConfig) -> Self {
        Self {
            config,
            store: None,
            navigator: None,
            auth: None,
            transport: None,
            request_stages: Vec::new(),
            response_stages: Vec::new(),
            logging: Some(LoggingInterceptor::new()),
        }
    }

    /// Use this credential store.
    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use this navigator for redirects to login.
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Use this collaborator for validate/refresh.
    pub fn auth(mut self, auth: Arc<dyn AuthCollaborator>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Send requests through this transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Add a request stage after the standard header stages.
    pub fn request_interceptor<I: RequestInterceptor + 'static>(mut self, stage: I) -> Self {
        self.request_stages.push(Arc::new(stage));
        self
    }

    /// Add a response stage.
    pub fn response_interceptor<I: ResponseInterceptor + 'static>(mut self, stage: I) -> Self {
        self.response_stages.push(Arc::new(stage));
        self
    }

    /// Replace the request/response logging stage.
    pub fn logging(mut self, logging: LoggingInterceptor) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Disable the logging stage.
    pub fn without_logging(mut self) -> Self {
        self.logging = None;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<AuthenticatedHttpClient> {
        let config = self.config;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryCredentialStore::default()));
        let navigator = self.navigator.unwrap_or_else(|| Arc::new(LogNavigator));
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&config)?),
        };
        let auth = self.auth.unwrap_or_else(|| {
            Arc::new(AuthApi::with_transport(
                &config,
                transport.clone(),
                store.clone(),
            ))
        });

        let mut pipeline = Pipeline::for_config(&config, store.clone());
        for stage in self.request_stages {
            pipeline.push_request_stage(stage);
        }
        if let Some(logging) = self.logging.clone() {
            pipeline.push_request_stage(Arc::new(logging));
        }
        if let Some(logging) = self.logging {
            pipeline.push_response_stage(Arc::new(logging));
        }
        for stage in self.response_stages {
            pipeline.push_response_stage(stage);
        }

        let mut recovery = RecoveryProtocol::new(
            config.credential_mode,
            auth,
            store.clone(),
            navigator,
            config.login_url.clone(),
        );
        if !config.coalesce_refresh {
            recovery = recovery.without_coalescing();
        }

        debug!(
            base_url = %config.base_url,
            mode = ?config.credential_mode,
            auth_enforced = config.auth_enforced,
            "Created authenticated HTTP client"
        );

        Ok(AuthenticatedHttpClient {
            config: Arc::new(config),
            transport,
            pipeline: Arc::new(pipeline),
            recovery: Arc::new(recovery),
            store,
        })
    }
}
