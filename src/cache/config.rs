//! Cache and push-channel configuration.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::Duration;

use url::Url;

use crate::domain::types::ResourceType;

const DEFAULT_CAPACITY: usize = 2048;
const DEFAULT_PUSH_INITIAL_BACKOFF_MS: u64 = 500;
const DEFAULT_PUSH_MAX_BACKOFF_MS: u64 = 30_000;
const DEFAULT_PUSH_BUFFER: usize = 256;

/// Behavior of the fetch-through cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Master switch; when false every fetch goes straight to the producer.
    pub enabled: bool,
    /// Maximum number of entries held before LRU eviction.
    pub capacity: usize,
    /// Per-resource TTL overrides, in seconds.
    pub ttl_overrides_secs: HashMap<ResourceType, u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_CAPACITY,
            ttl_overrides_secs: HashMap::new(),
        }
    }
}

impl CacheConfig {
    /// Freshness window for one resource family.
    pub fn ttl_for(&self, resource: ResourceType) -> Duration {
        let secs = self
            .ttl_overrides_secs
            .get(&resource)
            .copied()
            .unwrap_or_else(|| resource.default_ttl_secs());
        Duration::from_secs(secs)
    }

    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            capacity: settings.capacity,
            ttl_overrides_secs: settings.ttl_secs.clone(),
        }
    }
}

/// Behavior of the upstream push subscription.
#[derive(Debug, Clone)]
pub struct PushChannelConfig {
    /// Upstream SSE endpoint; `None` disables the subscription entirely
    /// (the cache then degrades to TTL expiry alone).
    pub events_url: Option<Url>,
    /// First reconnect delay after a drop.
    pub initial_backoff: Duration,
    /// Ceiling for the exponential reconnect delay.
    pub max_backoff: Duration,
    /// Broadcast buffer for browser-facing fan-out.
    pub buffer: usize,
}

impl Default for PushChannelConfig {
    fn default() -> Self {
        Self {
            events_url: None,
            initial_backoff: Duration::from_millis(DEFAULT_PUSH_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_PUSH_MAX_BACKOFF_MS),
            buffer: DEFAULT_PUSH_BUFFER,
        }
    }
}

impl From<&crate::config::PushSettings> for PushChannelConfig {
    fn from(settings: &crate::config::PushSettings) -> Self {
        Self {
            events_url: settings.events_url.clone(),
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
            buffer: settings.buffer,
        }
    }
}
