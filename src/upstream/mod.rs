//! Upstream Dash API access
//!
//! Connection resolution plus a typed HTTP client, shared by every tool
//! handler through [`DashService`].

pub mod client;
pub mod resolver;

pub use client::{
    DashApiClient, Docset, FtsAck, SearchHit, SearchRequest, SearchResponse, CONNECT_HINT,
};
pub use resolver::ConnectionResolver;

use crate::config::UpstreamConfig;
use crate::error::{Error, Result};
use crate::utils::metrics::PerformanceCounter;
use crate::utils::validation;
use std::future::Future;
use url::Url;

/// Upstream access service
///
/// Holds the resolved connection target and the request counters. The
/// service is an explicit process-scoped object passed to each tool
/// handler, never a hidden singleton.
pub struct DashService {
    config: UpstreamConfig,
    client: DashApiClient,
    resolver: ConnectionResolver,
    counter: PerformanceCounter,
}

impl DashService {
    /// Create a new service from upstream configuration
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let client = DashApiClient::new(&config)?;
        let resolver = ConnectionResolver::new(config.clone(), client.clone());

        Ok(Self {
            config,
            client,
            resolver,
            counter: PerformanceCounter::new(),
        })
    }

    /// Get upstream configuration
    #[must_use]
    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    /// Get the connection resolver
    #[must_use]
    pub fn resolver(&self) -> &ConnectionResolver {
        &self.resolver
    }

    /// Get request counters
    #[must_use]
    pub fn counter(&self) -> &PerformanceCounter {
        &self.counter
    }

    /// List installed docsets in upstream order
    pub async fn list_docsets(&self) -> Result<Vec<Docset>> {
        self.with_base(|client, base| async move { client.list_docsets(&base).await })
            .await
    }

    /// Search documentation. Input validation happens before any network
    /// call is attempted
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        validation::validate_query(&request.query)?;
        validation::validate_max_results(request.max_results)?;

        let request = request.clone();
        self.with_base(move |client, base| async move { client.search(&base, &request).await })
            .await
    }

    /// Enable full-text search for one docset. Repeating the call for an
    /// already-enabled docset is a no-op success upstream
    pub async fn enable_fts(&self, identifier: &str) -> Result<FtsAck> {
        validation::validate_identifier(identifier)?;

        let identifier = identifier.trim().to_string();
        self.with_base(move |client, base| async move {
            client.enable_fts(&base, &identifier).await
        })
        .await
    }

    /// Resolve the upstream target and run one health-check round trip
    pub async fn health_check(&self) -> Result<Url> {
        let base = self.resolver.resolve().await?;
        self.client.health_check(&base).await?;
        Ok(base)
    }

    /// Resolve the target, then run one request against it. A connectivity
    /// failure marks the cached target stale so the next call re-resolves
    async fn with_base<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(DashApiClient, Url) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let base = self.resolver.resolve().await?;
        let start = self.counter.record_request_start();

        let result = op(self.client.clone(), base).await;
        self.counter.record_request_complete(start, result.is_ok());

        if matches!(&result, Err(Error::Connectivity(_))) {
            self.resolver.mark_stale().await;
        }

        result
    }
}
