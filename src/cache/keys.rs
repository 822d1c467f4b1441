//! Cache key definitions.
//!
//! A key is the composite `(resource, scope, view)`: which entity family,
//! whose copy, and which projection of it (one entity, the list, or the
//! count). List and count are distinct views of the same key family so that
//! invalidating a collection never has to enumerate entity ids.

use crate::domain::types::{ResourceType, Scope};

/// Projection of a resource family a cache entry holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum View {
    /// A single entity addressed by its upstream id.
    Detail(String),
    /// The collection listing.
    List,
    /// The collection cardinality.
    Count,
}

/// Composite cache key: `(resource, scope, view)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub resource: ResourceType,
    pub scope: Scope,
    pub view: View,
}

impl CacheKey {
    pub fn detail(resource: ResourceType, scope: Scope, id: impl Into<String>) -> Self {
        Self {
            resource,
            scope,
            view: View::Detail(id.into()),
        }
    }

    pub fn list(resource: ResourceType, scope: Scope) -> Self {
        Self {
            resource,
            scope,
            view: View::List,
        }
    }

    pub fn count(resource: ResourceType, scope: Scope) -> Self {
        Self {
            resource,
            scope,
            view: View::Count,
        }
    }

    /// True when this key belongs to the `(resource, scope)` prefix,
    /// regardless of view. Drives `delete_by_prefix`.
    pub fn matches_prefix(&self, resource: ResourceType, scope: &Scope) -> bool {
        self.resource == resource && self.scope == *scope
    }
}
