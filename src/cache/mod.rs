//! Varco resource cache subsystem.
//!
//! The fetch-through cache that sits between every read handler and the
//! upstream API, the invalidation entry points the write handlers call, and
//! the push channel that evicts proactively when upstream state changes.
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `varco.toml`:
//!
//! ```toml
//! [cache]
//! enabled = true
//! capacity = 2048
//! [cache.ttl_secs]
//! blog = 600
//! notification = 10
//! ```

mod accessor;
mod channel;
mod config;
mod events;
mod invalidator;
mod keys;
mod lock;
mod scope;
mod store;

pub use accessor::{CacheAccessor, FetchError};
pub use channel::{ChannelError, ChannelState, PushChannel};
pub use config::{CacheConfig, PushChannelConfig};
pub use events::{PushBus, PushEvent, PushKind};
pub use invalidator::Invalidator;
pub use keys::{CacheKey, View};
pub use scope::{RequestContext, ScopeUnavailable, resolve as resolve_scope};
pub use store::CacheStore;
