use std::sync::Arc;

use axum::extract::{Extension, Path, State};
use axum::response::Response;

use crate::cache::RequestContext;
use crate::domain::types::ResourceType;

use super::super::error::ApiError;
use super::super::state::AppState;
use super::{json_payload, map_fetch};

const RESOURCE: ResourceType = ResourceType::Media;
const PATH: &str = "media";

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
