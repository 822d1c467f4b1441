//! Scope resolution: from request context to cache-key scope.
//!
//! Resolution is pure. A request that lacks the identity a resource needs is
//! a wiring error (auth must run before the cache is reached) and surfaces as
//! `ScopeUnavailable`.

use uuid::Uuid;

use crate::domain::types::{ResourceType, Scope, ScopeKind};

/// Identity and context attached to an inbound request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Authenticated user, if any.
    pub user: Option<Uuid>,
    /// Workplace addressed by the request, if any.
    pub workplace: Option<Uuid>,
    /// Negotiated locale for user-facing messages.
    pub locale: Option<String>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_user(user: Uuid) -> Self {
        Self {
            user: Some(user),
            ..Self::default()
        }
    }

    /// The same identity, addressed at one workplace.
    pub fn with_workplace(&self, workplace: Uuid) -> Self {
        Self {
            workplace: Some(workplace),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot scope `{resource}`: {missing} identity missing from request")]
pub struct ScopeUnavailable {
    pub resource: ResourceType,
    pub missing: &'static str,
}

/// Derive the cache scope for `resource` under `ctx`.
pub fn resolve(ctx: &RequestContext, resource: ResourceType) -> Result<Scope, ScopeUnavailable> {
    match resource.scope_kind() {
        ScopeKind::Global => Ok(Scope::Global),
        ScopeKind::User => ctx
            .user
            .map(Scope::User)
            .ok_or(ScopeUnavailable {
                resource,
                missing: "user",
            }),
        ScopeKind::Workplace => ctx
            .workplace
            .map(Scope::Workplace)
            .ok_or(ScopeUnavailable {
                resource,
                missing: "workplace",
            }),
    }
}
