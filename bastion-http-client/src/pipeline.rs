//! Ordered request/response stages.

use std::sync::Arc;

use crate::interceptor::{
    BearerAuthInterceptor, DefaultHeadersInterceptor, JsonHeadersInterceptor, LoggingInterceptor,
    RequestInterceptor, ResponseInterceptor,
};
use crate::{CredentialStore, HttpClientConfig, PendingRequest, RawResponse, Result, Transport};

/// Deterministic pipeline run by the client for every attempt.
///
/// Request stages run in insertion order before the request leaves; response
/// stages run in insertion order on whatever response came back.
#[derive(Clone, Default)]
pub struct Pipeline {
    request_stages: Vec<Arc<dyn RequestInterceptor>>,
    response_stages: Vec<Arc<dyn ResponseInterceptor>>,
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard header stages for a configuration.
    pub fn for_config(config: &HttpClientConfig, store: Arc<dyn CredentialStore>) -> Self {
        let mut pipeline = Self::new()
            .with_request_stage(DefaultHeadersInterceptor::new(&config.default_headers))
            .with_request_stage(JsonHeadersInterceptor);

        if config.uses_bearer_token() {
            pipeline = pipeline.with_request_stage(BearerAuthInterceptor::new(store));
        }

        pipeline
    }

    /// Append a request stage.
    pub fn with_request_stage<I: RequestInterceptor + 'static>(mut self, stage: I) -> Self {
        self.request_stages.push(Arc::new(stage));
        self
    }

    /// Append a response stage.
    pub fn with_response_stage<I: ResponseInterceptor + 'static>(mut self, stage: I) -> Self {
        self.response_stages.push(Arc::new(stage));
        self
    }

    /// Append a shared request stage.
    pub fn push_request_stage(&mut self, stage: Arc<dyn RequestInterceptor>) {
        self.request_stages.push(stage);
    }

    /// Append a shared response stage.
    pub fn push_response_stage(&mut self, stage: Arc<dyn ResponseInterceptor>) {
        self.response_stages.push(stage);
    }

    /// Append request/response logging.
    pub fn with_logging(self, logging: LoggingInterceptor) -> Self {
        self.with_request_stage(logging.clone())
            .with_response_stage(logging)
    }

    pub fn request_stage_count(&self) -> usize {
        self.request_stages.len()
    }

    pub fn response_stage_count(&self) -> usize {
        self.response_stages.len()
    }

    /// Run all request stages.
    pub async fn prepare(&self, mut request: PendingRequest) -> Result<PendingRequest> {
        for stage in &self.request_stages {
            request = stage.intercept(request).await?;
        }
        Ok(request)
    }

    /// Run all response stages.
    pub async fn observe(&self, mut response: RawResponse) -> Result<RawResponse> {
        for stage in &self.response_stages {
            response = stage.intercept(response).await?;
        }
        Ok(response)
    }

    /// Prepare, send and observe one attempt.
    ///
    /// Returns the request exactly as it was sent, for replay, alongside the
    /// transport result. When a request stage fails nothing was sent and no
    /// request is returned.
    pub async fn run(
        &self,
        transport: &dyn Transport,
        request: PendingRequest,
    ) -> (Option<PendingRequest>, Result<RawResponse>) {
        let request = match self.prepare(request).await {
            Ok(request) => request,
            Err(e) => return (None, Err(e)),
        };

        let result = match transport.send(&request).await {
            Ok(response) => self.observe(response).await,
            Err(e) => Err(e),
        };

        (Some(request), result)
    }
}
