use std::sync::Arc;

use crate::application::locale::Catalog;
use crate::cache::{CacheAccessor, Invalidator, PushBus};
use crate::infra::upstream::ApiClient;

use super::session::SessionStore;

/// Shared state for every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    pub accessor: Arc<CacheAccessor>,
    pub invalidator: Arc<Invalidator>,
    pub upstream: Arc<ApiClient>,
    pub sessions: Arc<SessionStore>,
    pub bus: Arc<PushBus>,
    pub messages: Arc<Catalog>,
}
