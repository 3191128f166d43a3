//! Prioritized performer-name resolution
//!
//! Orchestrates the cache-then-network cascade: every canonical variant of a
//! product code is checked against the lookup cache for every configured
//! source before a single network request goes out, then never-queried
//! variant/source pairs are tried live in the same order. Source order in
//! the configuration is the trust order; earlier sources win.
//!
//! "No match" is a normal value here, not an error: `resolve` returns
//! `Ok(None)` when no source knows the code, and the product simply stays
//! unresolved until a future run.

use crate::db::lookup_cache;
use crate::normalize;
use castlink_common::Result;
use serde::Deserialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;

/// One configured external index. Priority is list position in the config;
/// the most trusted source comes first.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    /// Crawler-owned extraction endpoint answering name lookups for this
    /// index (the crawler owns HTTP/HTML parsing of the index itself)
    pub endpoint: String,
    /// Mandatory delay between live requests to this index
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    /// Keyword-matched free-text index: its names must pass the full-name
    /// heuristic before they may auto-link without corroboration
    #[serde(default)]
    pub free_text: bool,
}

fn default_min_interval_ms() -> u64 {
    1000
}

/// Live query failure. Never fatal: the resolver treats it as "no
/// candidates from this source" and moves on.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Status(u16, String),

    #[error("Decode error: {0}")]
    Decode(String),
}

/// Seam for live index lookups. Production uses `WikiIndexClient`; tests
/// substitute scripted fakes.
#[async_trait::async_trait]
pub trait SourceQuery: Send + Sync {
    async fn fetch(
        &self,
        source: &SourceConfig,
        code: &str,
    ) -> std::result::Result<Vec<String>, QueryError>;
}

/// Successful resolution: raw candidates plus where and what matched
#[derive(Debug, Clone)]
pub struct Resolution {
    pub names: Vec<String>,
    pub source: String,
    pub variant: String,
    /// Carried from the matching source's config; the runner applies the
    /// full-name heuristic when set
    pub free_text: bool,
}

/// Cache-then-network resolver over prioritized sources
pub struct SourceResolver {
    db: SqlitePool,
    sources: Vec<SourceConfig>,
    client: Arc<dyn SourceQuery>,
}

impl SourceResolver {
    pub fn new(db: SqlitePool, sources: Vec<SourceConfig>, client: Arc<dyn SourceQuery>) -> Self {
        Self {
            db,
            sources,
            client,
        }
    }

    /// Resolve candidate performer names for an as-crawled ASP code.
    ///
    /// Variant order and source order are both significant: more specific
    /// code renderings and more trusted sources are consulted first, and
    /// the cache is exhausted across all pairs before any live query runs.
    pub async fn resolve(&self, asp_code: &str) -> Result<Option<Resolution>> {
        let variants = normalize::variants(asp_code);
        if variants.is_empty() {
            return Ok(None);
        }

        // Phase 1: cache, exhaustively, before any network call
        for variant in &variants {
            for source in &self.sources {
                if let Some(names) = lookup_cache::get(&self.db, variant, &source.name).await? {
                    if !names.is_empty() {
                        tracing::debug!(
                            code = %asp_code,
                            variant = %variant,
                            source = %source.name,
                            count = names.len(),
                            "Cache hit"
                        );
                        return Ok(Some(Resolution {
                            names,
                            source: source.name.clone(),
                            variant: variant.clone(),
                            free_text: source.free_text,
                        }));
                    }
                }
            }
        }

        // Phase 2: live queries for never-queried pairs, same order. Every
        // answer (including an empty one) is memoized before returning.
        for variant in &variants {
            for source in &self.sources {
                if lookup_cache::get(&self.db, variant, &source.name)
                    .await?
                    .is_some()
                {
                    continue;
                }

                match self.client.fetch(source, variant).await {
                    Ok(names) => {
                        lookup_cache::put(&self.db, variant, &source.name, &names).await?;
                        if !names.is_empty() {
                            tracing::info!(
                                code = %asp_code,
                                variant = %variant,
                                source = %source.name,
                                count = names.len(),
                                "Live lookup succeeded"
                            );
                            return Ok(Some(Resolution {
                                names,
                                source: source.name.clone(),
                                variant: variant.clone(),
                                free_text: source.free_text,
                            }));
                        }
                    }
                    Err(e) => {
                        // Source unavailable: same as an empty answer, but
                        // not memoized so a later run can retry.
                        tracing::warn!(
                            variant = %variant,
                            source = %source.name,
                            error = %e,
                            "Live lookup failed, trying next source"
                        );
                    }
                }
            }
        }

        tracing::debug!(code = %asp_code, "No source yielded candidates");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use tokio::sync::Mutex;

    /// Scripted fake: canned answers per (source, code), recorded calls
    struct ScriptedSource {
        answers: HashMap<(String, String), Vec<String>>,
        failures: HashSet<(String, String)>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedSource {
        fn new() -> Self {
            Self {
                answers: HashMap::new(),
                failures: HashSet::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn answer(mut self, source: &str, code: &str, names: &[&str]) -> Self {
            self.answers.insert(
                (source.to_string(), code.to_string()),
                names.iter().map(|s| s.to_string()).collect(),
            );
            self
        }

        fn fail(mut self, source: &str, code: &str) -> Self {
            self.failures.insert((source.to_string(), code.to_string()));
            self
        }

        async fn call_count(&self) -> usize {
            self.calls.lock().await.len()
        }
    }

    #[async_trait::async_trait]
    impl SourceQuery for ScriptedSource {
        async fn fetch(
            &self,
            source: &SourceConfig,
            code: &str,
        ) -> std::result::Result<Vec<String>, QueryError> {
            let key = (source.name.clone(), code.to_string());
            self.calls.lock().await.push(key.clone());
            if self.failures.contains(&key) {
                return Err(QueryError::Status(503, "unavailable".to_string()));
            }
            Ok(self.answers.get(&key).cloned().unwrap_or_default())
        }
    }

    fn source(name: &str, free_text: bool) -> SourceConfig {
        SourceConfig {
            name: name.to_string(),
            endpoint: format!("http://127.0.0.1:7110/{name}"),
            min_interval_ms: 0,
            free_text,
        }
    }

    async fn setup_pool() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        castlink_common::db::init_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn higher_priority_cache_hit_wins() {
        let pool = setup_pool().await;
        lookup_cache::put(&pool, "HEYZO-0463", "blogagg", &["まゆみ".to_string()])
            .await
            .unwrap();
        lookup_cache::put(&pool, "HEYZO-0463", "wikidex", &["さくら".to_string()])
            .await
            .unwrap();

        let client = Arc::new(ScriptedSource::new());
        let resolver = SourceResolver::new(
            pool,
            vec![source("wikidex", false), source("blogagg", true)],
            client.clone(),
        );

        let resolution = resolver.resolve("HEYZO-0463").await.unwrap().unwrap();
        assert_eq!(resolution.source, "wikidex");
        assert_eq!(resolution.names, vec!["さくら".to_string()]);
        // Cache answered; nothing went to the network
        assert_eq!(client.call_count().await, 0);
    }

    #[tokio::test]
    async fn cache_is_exhausted_before_any_live_query() {
        let pool = setup_pool().await;
        // Low-priority source has a cached answer; high-priority source
        // would answer live. Cache still wins.
        lookup_cache::put(&pool, "HEYZO-0463", "blogagg", &["まゆみ".to_string()])
            .await
            .unwrap();

        let client = Arc::new(
            ScriptedSource::new().answer("wikidex", "HEYZO-0463", &["さくら"]),
        );
        let resolver = SourceResolver::new(
            pool,
            vec![source("wikidex", false), source("blogagg", true)],
            client.clone(),
        );

        let resolution = resolver.resolve("HEYZO-0463").await.unwrap().unwrap();
        assert_eq!(resolution.source, "blogagg");
        assert_eq!(client.call_count().await, 0);
    }

    #[tokio::test]
    async fn live_answer_is_written_back_to_cache() {
        let pool = setup_pool().await;
        let client = Arc::new(
            ScriptedSource::new().answer("wikidex", "300MIUM-123", &["さくら"]),
        );
        let resolver =
            SourceResolver::new(pool.clone(), vec![source("wikidex", false)], client.clone());

        let resolution = resolver.resolve("300MIUM-123").await.unwrap().unwrap();
        assert_eq!(resolution.variant, "300MIUM-123");
        assert_eq!(resolution.names, vec!["さくら".to_string()]);

        let cached = lookup_cache::get(&pool, "300MIUM-123", "wikidex")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached, vec!["さくら".to_string()]);
    }

    #[tokio::test]
    async fn failed_source_falls_through_to_next() {
        let pool = setup_pool().await;
        let client = Arc::new(
            ScriptedSource::new()
                .fail("wikidex", "HEYZO-0463")
                .answer("blogagg", "HEYZO-0463", &["まゆみ"]),
        );
        let resolver = SourceResolver::new(
            pool.clone(),
            vec![source("wikidex", false), source("blogagg", true)],
            client,
        );

        let resolution = resolver.resolve("HEYZO-0463").await.unwrap().unwrap();
        assert_eq!(resolution.source, "blogagg");

        // The failure was not memoized; only the successful answer was
        assert_eq!(
            lookup_cache::get(&pool, "HEYZO-0463", "wikidex").await.unwrap(),
            None
        );
        assert!(lookup_cache::get(&pool, "HEYZO-0463", "blogagg")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn empty_answers_are_memoized_and_not_requeried() {
        let pool = setup_pool().await;
        let client = Arc::new(ScriptedSource::new());
        let resolver =
            SourceResolver::new(pool.clone(), vec![source("wikidex", false)], client.clone());

        assert!(resolver.resolve("HEYZO-0463").await.unwrap().is_none());
        let first_round = client.call_count().await;
        assert!(first_round > 0);

        // Second resolution finds every pair memoized; no new queries
        assert!(resolver.resolve("HEYZO-0463").await.unwrap().is_none());
        assert_eq!(client.call_count().await, first_round);
    }

    #[tokio::test]
    async fn unknown_code_with_no_sources_is_a_clean_miss() {
        let pool = setup_pool().await;
        let resolver = SourceResolver::new(pool, Vec::new(), Arc::new(ScriptedSource::new()));
        assert!(resolver.resolve("GVH-802").await.unwrap().is_none());
        assert!(resolver.resolve("").await.unwrap().is_none());
    }
}
