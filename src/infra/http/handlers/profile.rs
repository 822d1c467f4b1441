//! Profile resources are scoped to the authenticated user; the router gates
//! these routes behind a session.

use std::sync::Arc;

use axum::extract::{Extension, Path, State};
use axum::response::Response;
use reqwest::Method;

use crate::cache::RequestContext;
use crate::domain::types::ResourceType;

use super::super::error::ApiError;
use super::super::state::AppState;
use super::{json_payload, map_fetch, map_scope, map_upstream};

pub async fn events(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response, ApiError> {
    let upstream = Arc::clone(&state.upstream);
    let payload = state
        .accessor
        .fetch_list(&ctx, ResourceType::ProfileEvent, move || async move {
            upstream.get("profile/events", &[]).await
        })
        .await
        .map_err(|err| map_fetch(&state, &ctx, err))?;
    Ok(json_payload(payload))
}

pub async fn plugins(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response, ApiError> {
    let upstream = Arc::clone(&state.upstream);
    let payload = state
        .accessor
        .fetch_list(&ctx, ResourceType::ProfilePlugin, move || async move {
            upstream.get("profile/plugins", &[]).await
        })
        .await
        .map_err(|err| map_fetch(&state, &ctx, err))?;
    Ok(json_payload(payload))
}

pub async fn enable_plugin(
    state: State<AppState>,
    ctx: Extension<RequestContext>,
    id: Path<String>,
) -> Result<Response, ApiError> {
    set_plugin_enabled(state, ctx, id, true).await
}

pub async fn disable_plugin(
    state: State<AppState>,
    ctx: Extension<RequestContext>,
    id: Path<String>,
) -> Result<Response, ApiError> {
    set_plugin_enabled(state, ctx, id, false).await
}

async fn set_plugin_enabled(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    enabled: bool,
) -> Result<Response, ApiError> {
    let action = if enabled { "enable" } else { "disable" };
    let payload = state
        .upstream
        .send(Method::POST, &format!("profile/plugins/{id}/{action}"), None)
        .await
        .map_err(|err| map_upstream(&state, &ctx, err))?;
    state
        .invalidator
        .invalidate_entity(&ctx, ResourceType::ProfilePlugin, &id)
        .map_err(|err| map_scope(&state, &ctx, err))?;
    Ok(json_payload(payload))
}
