//! Resource families and cache scopes.
//!
//! `ResourceType` is the closed set of domain tags the upstream API serves.
//! `Scope` is the visibility boundary of a cached value.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stable tag identifying a domain entity family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceType {
    User,
    Role,
    Workplace,
    Blog,
    Media,
    WorkspaceFolder,
    Notification,
    ProfileEvent,
    ProfilePlugin,
}

impl ResourceType {
    pub const ALL: [ResourceType; 9] = [
        ResourceType::User,
        ResourceType::Role,
        ResourceType::Workplace,
        ResourceType::Blog,
        ResourceType::Media,
        ResourceType::WorkspaceFolder,
        ResourceType::Notification,
        ResourceType::ProfileEvent,
        ResourceType::ProfilePlugin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::User => "user",
            ResourceType::Role => "role",
            ResourceType::Workplace => "workplace",
            ResourceType::Blog => "blog",
            ResourceType::Media => "media",
            ResourceType::WorkspaceFolder => "workspace-folder",
            ResourceType::Notification => "notification",
            ResourceType::ProfileEvent => "profile-event",
            ResourceType::ProfilePlugin => "profile-plugin",
        }
    }

    /// The scope family this resource is cached under.
    pub fn scope_kind(&self) -> ScopeKind {
        match self {
            ResourceType::User
            | ResourceType::Role
            | ResourceType::Workplace
            | ResourceType::Blog
            | ResourceType::Media
            | ResourceType::Notification => ScopeKind::Global,
            ResourceType::ProfileEvent | ResourceType::ProfilePlugin => ScopeKind::User,
            ResourceType::WorkspaceFolder => ScopeKind::Workplace,
        }
    }

    /// Default freshness window, in seconds, when no configured override exists.
    ///
    /// Near-static shared resources tolerate long windows; volatile ones get
    /// short windows so TTL expiry alone keeps them usable when the push
    /// channel is down.
    pub fn default_ttl_secs(&self) -> u64 {
        match self {
            ResourceType::Role | ResourceType::Blog | ResourceType::Media => 300,
            ResourceType::User | ResourceType::Workplace => 120,
            ResourceType::WorkspaceFolder => 60,
            ResourceType::ProfileEvent | ResourceType::ProfilePlugin => 60,
            ResourceType::Notification => 15,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = UnknownResource;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|resource| resource.as_str() == value)
            .ok_or_else(|| UnknownResource(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource type `{0}`")]
pub struct UnknownResource(pub String);

/// The scope family a resource resolves into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    User,
    Workplace,
}

/// The visibility boundary of a cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Global,
    User(Uuid),
    Workplace(Uuid),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => f.write_str("global"),
            Scope::User(id) => write!(f, "user:{id}"),
            Scope::Workplace(id) => write!(f, "workplace:{id}"),
        }
    }
}
