//! Invalidation entry points for write handlers and the push channel.
//!
//! Eviction is synchronous: a write handler calls in after its upstream
//! mutation succeeds and before it responds, so the caller can never read
//! its own stale data. Invalidating absent keys is a no-op.

use std::sync::Arc;

use metrics::counter;
use tracing::debug;

use crate::domain::types::{ResourceType, Scope};

use super::keys::CacheKey;
use super::scope::{self, RequestContext, ScopeUnavailable};
use super::store::CacheStore;

pub(crate) const METRIC_CACHE_INVALIDATE: &str = "varco_cache_invalidate_total";

/// Type- and entity-scoped eviction over one cache store.
pub struct Invalidator {
    store: Arc<CacheStore>,
}

impl Invalidator {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }

    /// Drop the list/count caches for `resource` in the caller's scope.
    pub fn invalidate_collection(
        &self,
        ctx: &RequestContext,
        resource: ResourceType,
    ) -> Result<(), ScopeUnavailable> {
        let scope = scope::resolve(ctx, resource)?;
        self.invalidate_collection_scoped(resource, scope);
        Ok(())
    }

    /// Drop the detail cache for one entity in the caller's scope, and
    /// conservatively its owning list/count: a detail change usually means
    /// the aggregate views are stale too.
    pub fn invalidate_entity(
        &self,
        ctx: &RequestContext,
        resource: ResourceType,
        id: &str,
    ) -> Result<(), ScopeUnavailable> {
        let scope = scope::resolve(ctx, resource)?;
        self.invalidate_entity_scoped(resource, scope, id);
        Ok(())
    }

    /// Collection eviction at an explicit scope; used by the push channel,
    /// whose events carry their own scope instead of a request context.
    pub fn invalidate_collection_scoped(&self, resource: ResourceType, scope: Scope) {
        self.store.delete(&CacheKey::list(resource, scope));
        self.store.delete(&CacheKey::count(resource, scope));
        counter!(METRIC_CACHE_INVALIDATE, "resource" => resource.as_str()).increment(1);
        debug!(
            target = "varco::cache",
            resource = resource.as_str(),
            %scope,
            "collection invalidated"
        );
    }

    /// Entity eviction at an explicit scope.
    pub fn invalidate_entity_scoped(&self, resource: ResourceType, scope: Scope, id: &str) {
        self.store.delete(&CacheKey::detail(resource, scope, id));
        self.store.delete(&CacheKey::list(resource, scope));
        self.store.delete(&CacheKey::count(resource, scope));
        counter!(METRIC_CACHE_INVALIDATE, "resource" => resource.as_str()).increment(1);
        debug!(
            target = "varco::cache",
            resource = resource.as_str(),
            %scope,
            entity = id,
            "entity invalidated"
        );
    }

    /// Drop every cached view of `resource` at `scope`, whatever the entity.
    pub fn invalidate_all_scoped(&self, resource: ResourceType, scope: Scope) {
        let removed = self.store.delete_by_prefix(resource, &scope);
        counter!(METRIC_CACHE_INVALIDATE, "resource" => resource.as_str()).increment(1);
        debug!(
            target = "varco::cache",
            resource = resource.as_str(),
            %scope,
            removed,
            "prefix invalidated"
        );
    }
}
