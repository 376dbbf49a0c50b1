//! Synonym resolution against the external lexical service
//!
//! Resolved synonym lists are cached process-wide for the lifetime of the
//! process; entries never expire (stale synonyms are an accepted risk since
//! synonym lists for a given word are stable). Outbound lookups are gated
//! by a token-bucket rate limiter sized to the lexical service's quota, and
//! batch resolution fans out with bounded concurrency.

use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

const LOOKUP_TIMEOUT_SECS: u64 = 10;

/// Synonym resolver errors
#[derive(Debug, Error)]
pub enum SynonymError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Lexical service error {0}")]
    Service(u16),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Lexical service response: `{"synsets": [{"terms": [{"term": ...}]}]}`
#[derive(Debug, Deserialize)]
struct SynsetsResponse {
    #[serde(default)]
    synsets: Vec<Synset>,
}

#[derive(Debug, Deserialize)]
struct Synset {
    #[serde(default)]
    terms: Vec<Term>,
}

#[derive(Debug, Deserialize)]
struct Term {
    term: String,
}

type Limiter = governor::RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Synonym resolver with process-wide cache
pub struct SynonymResolver {
    client: reqwest::Client,
    base_url: String,
    cache: Arc<RwLock<HashMap<String, Vec<String>>>>,
    rate_limiter: Limiter,
    batch_concurrency: usize,
}

impl SynonymResolver {
    /// Create a resolver targeting `base_url`.
    ///
    /// `rate_per_sec` parameterizes the token bucket gating outbound
    /// lookups; `batch_concurrency` bounds in-flight lookups within one
    /// [`resolve_all`](Self::resolve_all) call.
    pub fn new(
        base_url: &str,
        rate_per_sec: u32,
        batch_concurrency: usize,
    ) -> Result<Self, SynonymError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(LOOKUP_TIMEOUT_SECS))
            .build()
            .map_err(|e| SynonymError::Network(e.to_string()))?;

        // Safe: max(1) guarantees a non-zero quota
        let quota = governor::Quota::per_second(NonZeroU32::new(rate_per_sec.max(1)).unwrap());

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: Arc::new(RwLock::new(HashMap::new())),
            rate_limiter: governor::RateLimiter::direct(quota),
            batch_concurrency: batch_concurrency.max(1),
        })
    }

    /// Resolve one tag to its synonym terms.
    ///
    /// Cache hits return immediately with no network access. Terms are
    /// normalized to lower-case before caching.
    pub async fn resolve(&self, tag: &str) -> Result<Vec<String>, SynonymError> {
        let tag = tag.to_lowercase();

        if let Some(cached) = self.cache.read().await.get(&tag) {
            tracing::debug!(tag = %tag, "Synonym cache hit");
            return Ok(cached.clone());
        }

        let synonyms = self.lookup(&tag).await?;

        // Last-writer-wins is fine: concurrent resolvers of the same tag
        // produce the same list
        self.cache
            .write()
            .await
            .insert(tag.clone(), synonyms.clone());

        tracing::debug!(tag = %tag, count = synonyms.len(), "Cached synonyms");
        Ok(synonyms)
    }

    /// Resolve a batch of tags, tolerating individual failures.
    ///
    /// Lookups run with bounded concurrency and the call returns once all
    /// complete. A failed lookup degrades to an empty synonym list for that
    /// tag and is logged; it never aborts the batch.
    pub async fn resolve_all<I>(&self, tags: I) -> BTreeMap<String, Vec<String>>
    where
        I: IntoIterator<Item = String>,
    {
        let results: Vec<(String, Vec<String>)> = stream::iter(tags)
            .map(|tag| async move {
                match self.resolve(&tag).await {
                    Ok(synonyms) => (tag.to_lowercase(), synonyms),
                    Err(e) => {
                        tracing::warn!(tag = %tag, error = %e, "Synonym lookup failed, using empty list");
                        (tag.to_lowercase(), Vec::new())
                    }
                }
            })
            .buffer_unordered(self.batch_concurrency)
            .collect()
            .await;

        results.into_iter().collect()
    }

    async fn lookup(&self, tag: &str) -> Result<Vec<String>, SynonymError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/synonyms", self.base_url);
        tracing::debug!(tag = %tag, "Querying lexical service");

        let response = self
            .client
            .get(&url)
            .query(&[("q", tag)])
            .send()
            .await
            .map_err(|e| SynonymError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SynonymError::Service(status.as_u16()));
        }

        let body: SynsetsResponse = response
            .json()
            .await
            .map_err(|e| SynonymError::Parse(e.to_string()))?;

        let mut seen = std::collections::HashSet::new();
        let mut synonyms = Vec::new();
        for synset in body.synsets {
            for term in synset.terms {
                let term = term.term.to_lowercase();
                if term != tag && seen.insert(term.clone()) {
                    synonyms.push(term);
                }
            }
        }

        Ok(synonyms)
    }
}
