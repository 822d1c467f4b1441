//! Workspace folders, nested under their workplace. The path parameter, not
//! the session, decides the cache scope here.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::response::Response;
use reqwest::Method;
use uuid::Uuid;

use crate::cache::RequestContext;
use crate::domain::types::ResourceType;

use super::super::error::ApiError;
use super::super::state::AppState;
use super::{json_payload, map_fetch, map_scope, map_upstream};

const RESOURCE: ResourceType = ResourceType::WorkspaceFolder;

fn collection_path(workplace: Uuid) -> String {
    format!("workplaces/{workplace}/folders")
}

pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(workplace): Path<Uuid>,
) -> Result<Response, ApiError> {
    let ctx = ctx.with_workplace(workplace);
    let upstream = Arc::clone(&state.upstream);
    let path = collection_path(workplace);
    let payload = state
        .accessor
        .fetch_list(&ctx, RESOURCE, move || async move {
            upstream.get(&path, &[]).await
        })
        .await
        .map_err(|err| map_fetch(&state, &ctx, err))?;
    Ok(json_payload(payload))
}

pub async fn detail(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((workplace, id)): Path<(Uuid, String)>,
) -> Result<Response, ApiError> {
    let ctx = ctx.with_workplace(workplace);
    let upstream = Arc::clone(&state.upstream);
    let path = format!("{}/{id}", collection_path(workplace));
    let payload = state
        .accessor
        .fetch_detail(&ctx, RESOURCE, &id, move || async move {
            upstream.get(&path, &[]).await
        })
        .await
        .map_err(|err| map_fetch(&state, &ctx, err))?;
    Ok(json_payload(payload))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(workplace): Path<Uuid>,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, ApiError> {
    let ctx = ctx.with_workplace(workplace);
    let payload = state
        .upstream
        .send(Method::POST, &collection_path(workplace), Some(&body))
        .await
        .map_err(|err| map_upstream(&state, &ctx, err))?;
    state
        .invalidator
        .invalidate_collection(&ctx, RESOURCE)
        .map_err(|err| map_scope(&state, &ctx, err))?;
    Ok(json_payload(payload))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((workplace, id)): Path<(Uuid, String)>,
) -> Result<Response, ApiError> {
    let ctx = ctx.with_workplace(workplace);
    let payload = state
        .upstream
        .send(
            Method::DELETE,
            &format!("{}/{id}", collection_path(workplace)),
            None,
        )
        .await
        .map_err(|err| map_upstream(&state, &ctx, err))?;
    state
        .invalidator
        .invalidate_entity(&ctx, RESOURCE, &id)
        .map_err(|err| map_scope(&state, &ctx, err))?;
    Ok(json_payload(payload))
}
