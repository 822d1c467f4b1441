use std::sync::Arc;

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::response::Response;
use reqwest::Method;

use crate::cache::RequestContext;
use crate::domain::types::ResourceType;

use super::super::error::ApiError;
use super::super::state::AppState;
use super::{json_payload, map_fetch, map_scope, map_upstream};

const RESOURCE: ResourceType = ResourceType::Workplace;
const PATH: &str = "workplaces";

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

pub async fn detail(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let upstream = Arc::clone(&state.upstream);
    let path = format!("{PATH}/{id}");
    let payload = state
        .accessor
        .fetch_detail(&ctx, RESOURCE, &id, move || async move {
            upstream.get(&path, &[]).await
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

pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, ApiError> {
    let payload = state
        .upstream
        .send(Method::POST, PATH, Some(&body))
        .await
        .map_err(|err| map_upstream(&state, &ctx, err))?;
    state
        .invalidator
        .invalidate_collection(&ctx, RESOURCE)
        .map_err(|err| map_scope(&state, &ctx, err))?;
    Ok(json_payload(payload))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, ApiError> {
    let payload = state
        .upstream
        .send(Method::PUT, &format!("{PATH}/{id}"), Some(&body))
        .await
        .map_err(|err| map_upstream(&state, &ctx, err))?;
    state
        .invalidator
        .invalidate_entity(&ctx, RESOURCE, &id)
        .map_err(|err| map_scope(&state, &ctx, err))?;
    Ok(json_payload(payload))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let payload = state
        .upstream
        .send(Method::DELETE, &format!("{PATH}/{id}"), None)
        .await
        .map_err(|err| map_upstream(&state, &ctx, err))?;
    state
        .invalidator
        .invalidate_entity(&ctx, RESOURCE, &id)
        .map_err(|err| map_scope(&state, &ctx, err))?;
    Ok(json_payload(payload))
}
