//! Resource handlers: thin pass-through glue between routes, the cache
//! accessor, and the upstream client. Payloads stay opaque JSON bytes end to
//! end.

use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use crate::cache::{FetchError, RequestContext, ScopeUnavailable};
use crate::infra::upstream::UpstreamError;

use super::error::ApiError;
use super::state::AppState;

pub mod blog;
pub mod folders;
pub mod media;
pub mod notifications;
pub mod profile;
pub mod roles;
pub mod users;
pub mod workplaces;

/// Relay an upstream JSON payload without re-parsing it.
pub(crate) fn json_payload(payload: Bytes) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], payload).into_response()
}

pub(crate) fn map_fetch(state: &AppState, ctx: &RequestContext, error: FetchError) -> ApiError {
    ApiError::from_fetch(error, &state.messages, ctx.locale.as_deref())
}

pub(crate) fn map_upstream(
    state: &AppState,
    ctx: &RequestContext,
    error: UpstreamError,
) -> ApiError {
    ApiError::from_upstream(error, &state.messages, ctx.locale.as_deref())
}

pub(crate) fn map_scope(
    state: &AppState,
    ctx: &RequestContext,
    error: ScopeUnavailable,
) -> ApiError {
    ApiError::from_fetch(FetchError::Scope(error), &state.messages, ctx.locale.as_deref())
}
