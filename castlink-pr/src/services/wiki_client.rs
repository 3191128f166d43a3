//! Live wiki-index client
//!
//! Production implementation of the `SourceQuery` seam. Index pages are
//! fetched and parsed by out-of-scope crawler collaborators; each source's
//! `endpoint` is that crawler's extraction service, queried here as an
//! opaque HTTP call returning already-extracted name strings.
//!
//! Each source enforces its own mandatory inter-request delay; delays are
//! configuration because acceptable rates differ per index.

use super::source_resolver::{QueryError, SourceConfig, SourceQuery};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const USER_AGENT: &str = concat!("castlink/", env!("CARGO_PKG_VERSION"));

/// Enforces a minimum interval between requests to one source
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Wait if necessary to comply with the source's rate limit
    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Extraction service response: candidate names for one code
#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    names: Vec<String>,
}

/// Reqwest-backed live lookups with per-source rate limiting
pub struct WikiIndexClient {
    http_client: reqwest::Client,
    limiters: HashMap<String, Arc<RateLimiter>>,
}

impl WikiIndexClient {
    pub fn new(
        sources: &[SourceConfig],
        request_timeout: Duration,
    ) -> Result<Self, QueryError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| QueryError::Network(e.to_string()))?;

        let limiters = sources
            .iter()
            .map(|s| {
                (
                    s.name.clone(),
                    Arc::new(RateLimiter::new(s.min_interval_ms)),
                )
            })
            .collect();

        Ok(Self {
            http_client,
            limiters,
        })
    }
}

#[async_trait::async_trait]
impl SourceQuery for WikiIndexClient {
    async fn fetch(
        &self,
        source: &SourceConfig,
        code: &str,
    ) -> Result<Vec<String>, QueryError> {
        if let Some(limiter) = self.limiters.get(&source.name) {
            limiter.wait().await;
        }

        tracing::debug!(source = %source.name, code = %code, "Querying extraction endpoint");

        let response = self
            .http_client
            .get(&source.endpoint)
            .query(&[("code", code)])
            .send()
            .await
            .map_err(|e| QueryError::Network(e.to_string()))?;

        let status = response.status();

        // The index has no page for this code: a clean empty answer
        if status == 404 {
            return Ok(Vec::new());
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(QueryError::Status(status.as_u16(), error_text));
        }

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| QueryError::Decode(e.to_string()))?;

        Ok(body.names)
    }
}
