//! Notifications run on a short TTL; marking one read evicts its views so
//! the badge count updates on the next poll.

use std::sync::Arc;

use axum::extract::{Extension, Path, State};
use axum::response::Response;
use reqwest::Method;

use crate::cache::RequestContext;
use crate::domain::types::ResourceType;

use super::super::error::ApiError;
use super::super::state::AppState;
use super::{json_payload, map_fetch, map_scope, map_upstream};

const RESOURCE: ResourceType = ResourceType::Notification;
const PATH: &str = "notifications";

pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response, ApiError> {
    let upstream = Arc::clone(&state.upstream);
    let payload = state
        .accessor
        .fetch_list(&ctx, RESOURCE, move || async move {
            upstream.get(PATH, &[]).await
        })
        .await
        .map_err(|err| map_fetch(&state, &ctx, err))?;
    Ok(json_payload(payload))
}

pub async fn count(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response, ApiError> {
    let upstream = Arc::clone(&state.upstream);
    let payload = state
        .accessor
        .fetch_count(&ctx, RESOURCE, move || async move {
            upstream.get(&format!("{PATH}/count"), &[]).await
        })
        .await
        .map_err(|err| map_fetch(&state, &ctx, err))?;
    Ok(json_payload(payload))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let payload = state
        .upstream
        .send(Method::POST, &format!("{PATH}/{id}/read"), None)
        .await
        .map_err(|err| map_upstream(&state, &ctx, err))?;
    state
        .invalidator
        .invalidate_entity(&ctx, RESOURCE, &id)
        .map_err(|err| map_scope(&state, &ctx, err))?;
    Ok(json_payload(payload))
}
