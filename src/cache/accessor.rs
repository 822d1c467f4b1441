//! Fetch-through accessor: the single entry point read handlers call.
//!
//! A hit returns immediately; a miss runs the supplied producer, stores the
//! payload on success, and propagates failure unchanged without caching it.
//! Concurrent misses for one key collapse into a single upstream call whose
//! result is shared (single flight). The producer runs on a detached task so
//! an aborted request still completes the cache fill.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use metrics::{counter, histogram};
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

use crate::domain::types::ResourceType;
use crate::infra::upstream::UpstreamError;

use super::config::CacheConfig;
use super::keys::{CacheKey, View};
use super::scope::{self, RequestContext, ScopeUnavailable};
use super::store::{CacheStore, FillAttempt, FillResult, FillSlot};

pub(crate) const METRIC_CACHE_HIT: &str = "varco_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "varco_cache_miss_total";
pub(crate) const METRIC_FETCH_ORIGIN_MS: &str = "varco_fetch_origin_ms";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error(transparent)]
    Scope(#[from] ScopeUnavailable),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Fetch-through cache accessor shared by every read handler.
///
/// Fills are registered in the store, so an invalidation racing a fill
/// retires it: later fetches start fresh and the retired fill cannot write
/// its pre-invalidation payload back.
pub struct CacheAccessor {
    config: CacheConfig,
    store: Arc<CacheStore>,
}

impl CacheAccessor {
    pub fn new(config: CacheConfig, store: Arc<CacheStore>) -> Self {
        Self { config, store }
    }

    /// Cached lookup of a single entity.
    pub async fn fetch_detail<P, Fut>(
        &self,
        ctx: &RequestContext,
        resource: ResourceType,
        id: &str,
        producer: P,
    ) -> Result<Bytes, FetchError>
    where
        P: FnOnce() -> Fut,
        Fut: Future<Output = FillResult> + Send + 'static,
    {
        self.fetch(ctx, resource, View::Detail(id.to_string()), producer)
            .await
    }

    /// Cached lookup of a collection listing.
    pub async fn fetch_list<P, Fut>(
        &self,
        ctx: &RequestContext,
        resource: ResourceType,
        producer: P,
    ) -> Result<Bytes, FetchError>
    where
        P: FnOnce() -> Fut,
        Fut: Future<Output = FillResult> + Send + 'static,
    {
        self.fetch(ctx, resource, View::List, producer).await
    }

    /// Cached lookup of a collection count.
    pub async fn fetch_count<P, Fut>(
        &self,
        ctx: &RequestContext,
        resource: ResourceType,
        producer: P,
    ) -> Result<Bytes, FetchError>
    where
        P: FnOnce() -> Fut,
        Fut: Future<Output = FillResult> + Send + 'static,
    {
        self.fetch(ctx, resource, View::Count, producer).await
    }

    async fn fetch<P, Fut>(
        &self,
        ctx: &RequestContext,
        resource: ResourceType,
        view: View,
        producer: P,
    ) -> Result<Bytes, FetchError>
    where
        P: FnOnce() -> Fut,
        Fut: Future<Output = FillResult> + Send + 'static,
    {
        let scope = scope::resolve(ctx, resource)?;
        let key = CacheKey {
            resource,
            scope,
            view,
        };

        if !self.config.enabled {
            return Ok(producer().await?);
        }

        if let Some(hit) = self.store.get(&key) {
            counter!(METRIC_CACHE_HIT, "resource" => resource.as_str()).increment(1);
            return Ok(hit);
        }
        counter!(METRIC_CACHE_MISS, "resource" => resource.as_str()).increment(1);

        let mut receiver = match self.store.begin_fill(&key) {
            FillAttempt::Joined(receiver) => {
                debug!(
                    target = "varco::cache",
                    resource = resource.as_str(),
                    scope = %key.scope,
                    "joining in-flight fill"
                );
                receiver
            }
            FillAttempt::Started {
                sender,
                receiver,
                token,
            } => {
                self.spawn_fill(key, token, sender, producer());
                receiver
            }
        };

        let outcome = receiver
            .wait_for(|slot| slot.is_some())
            .await
            .map(|slot| slot.clone())
            .map_err(|_| UpstreamError::aborted("cache fill task dropped"))?;

        match outcome {
            Some(result) => Ok(result?),
            // Unreachable given the wait predicate; treated as an aborted fill.
            None => Err(FetchError::Upstream(UpstreamError::aborted(
                "cache fill produced no result",
            ))),
        }
    }

    /// Run the producer to completion on its own task, publish the outcome
    /// to every waiter, and hand successful payloads to the store. Detached
    /// on purpose: a fill outlives the request that triggered it. Whether
    /// the payload lands in the cache is the store's call; the fill may have
    /// been retired by an invalidation while the producer ran.
    fn spawn_fill<Fut>(
        &self,
        key: CacheKey,
        token: u64,
        sender: watch::Sender<FillSlot>,
        producer: Fut,
    ) where
        Fut: Future<Output = FillResult> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let ttl = self.config.ttl_for(key.resource);

        tokio::spawn(async move {
            let origin_started_at = Instant::now();
            let result = producer.await;
            histogram!(METRIC_FETCH_ORIGIN_MS, "resource" => key.resource.as_str())
                .record(origin_started_at.elapsed().as_secs_f64() * 1000.0);

            let payload = result.as_ref().ok().map(|value| (value.clone(), ttl));
            store.finish_fill(&key, token, payload);
            let _ = sender.send(Some(result));
        });
    }
}
