//! JSON error envelope for the browser-facing API.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::locale::Catalog;
use crate::cache::FetchError;
use crate::infra::upstream::UpstreamError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const NOT_FOUND: &str = "not_found";
    pub const UPSTREAM: &str = "upstream_error";
    pub const SCOPE_UNAVAILABLE: &str = "scope_unavailable";
    pub const INTERNAL: &str = "internal_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    hint: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: impl Into<String>,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            hint,
        }
    }

    pub fn unauthorized(messages: &Catalog, locale: Option<&str>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            messages.message(locale, "unauthorized"),
            None,
        )
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, None)
    }

    pub fn internal(messages: &Catalog, locale: Option<&str>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::INTERNAL,
            messages.message(locale, "internal"),
            None,
        )
    }

    /// Translate a cache fetch failure. Upstream statuses pass through
    /// verbatim; transport failures become a 502; a scope that could not be
    /// resolved is a server-side contract violation, not a client error.
    pub fn from_fetch(error: FetchError, messages: &Catalog, locale: Option<&str>) -> Self {
        match error {
            FetchError::Scope(scope) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::SCOPE_UNAVAILABLE,
                messages.message(locale, "internal"),
                Some(scope.to_string()),
            ),
            FetchError::Upstream(upstream) => Self::from_upstream(upstream, messages, locale),
        }
    }

    pub fn from_upstream(error: UpstreamError, messages: &Catalog, locale: Option<&str>) -> Self {
        match error {
            UpstreamError::Status { status, message } => {
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                Self::new(status, codes::UPSTREAM, message, None)
            }
            UpstreamError::Transport(detail) | UpstreamError::Aborted(detail) => Self::new(
                StatusCode::BAD_GATEWAY,
                codes::UPSTREAM,
                messages.message(locale, "upstream-unavailable"),
                Some(detail),
            ),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message,
                hint: self.hint,
            },
        };
        (self.status, Json(body)).into_response()
    }
}
