//! Browser session handling.
//!
//! Credentials are verified by the upstream API; this layer only mints and
//! tracks opaque bearer tokens so later requests can carry an identity
//! without re-authenticating upstream. Tokens are stored hashed and compared
//! in constant time.

use axum::Json;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::Next;
use axum::response::Response;
use dashmap::DashMap;
use reqwest::Method;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::RequestContext;

use super::error::ApiError;
use super::state::AppState;

const TOKEN_PREFIX: &str = "vrc_";
const WORKPLACE_HEADER: &str = "x-workplace-id";

struct Session {
    user: Uuid,
    token_hash: [u8; 32],
}

/// In-memory session registry keyed by token hash.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh bearer token for `user`.
    pub fn issue(&self, user: Uuid) -> String {
        let token = format!("{TOKEN_PREFIX}{}", Uuid::new_v4().simple());
        let token_hash = hash_token(&token);
        self.sessions
            .insert(hex::encode(token_hash), Session { user, token_hash });
        token
    }

    /// Resolve a presented token to its user, comparing hashes in constant
    /// time.
    pub fn resolve(&self, token: &str) -> Option<Uuid> {
        let presented = hash_token(token);
        let session = self.sessions.get(&hex::encode(presented))?;
        if session.token_hash.ct_eq(&presented).into() {
            Some(session.user)
        } else {
            None
        }
    }

    /// Drop a session. Unknown tokens are a no-op.
    pub fn revoke(&self, token: &str) {
        self.sessions.remove(&hex::encode(hash_token(token)));
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn hash_token(token: &str) -> [u8; 32] {
    Sha256::digest(token.as_bytes()).into()
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Build the per-request context from session, workplace header, and
/// negotiated locale, and attach it as a request extension. Runs on every
/// route; anonymous requests pass through with an empty identity.
pub async fn attach_context(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let headers = request.headers();

    let user = bearer_token(headers).and_then(|token| state.sessions.resolve(token));

    let workplace = match headers.get(WORKPLACE_HEADER) {
        Some(value) => {
            let raw = value
                .to_str()
                .map_err(|_| ApiError::bad_request("invalid x-workplace-id header"))?;
            Some(
                raw.parse::<Uuid>()
                    .map_err(|_| ApiError::bad_request("x-workplace-id is not a UUID"))?,
            )
        }
        None => None,
    };

    let accept_language = headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|value| value.to_str().ok());
    let locale = state.messages.negotiate(accept_language);

    let ctx = RequestContext {
        user,
        workplace,
        locale: Some(locale),
    };
    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}

/// Reject requests whose context carries no authenticated user.
pub async fn require_session(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (authenticated, locale) = match request.extensions().get::<RequestContext>() {
        Some(ctx) => (ctx.user.is_some(), ctx.locale.clone()),
        None => (false, None),
    };
    if authenticated {
        Ok(next.run(request).await)
    } else {
        Err(ApiError::unauthorized(&state.messages, locale.as_deref()))
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, serde::Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: serde_json::Value,
}

/// POST /auth/login. Credentials go straight upstream; a success mints a
/// local session token bound to the returned user id.
pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let body = serde_json::json!({
        "username": credentials.username,
        "password": credentials.password,
    });
    let payload = state
        .upstream
        .send(Method::POST, "auth/login", Some(&body))
        .await
        .map_err(|err| ApiError::from_upstream(err, &state.messages, None))?;

    let user: serde_json::Value = serde_json::from_slice(&payload).map_err(|err| {
        warn!(target = "varco::http", error = %err, "login payload was not JSON");
        ApiError::internal(&state.messages, None)
    })?;
    let user_id = user
        .get("id")
        .and_then(|id| id.as_str())
        .and_then(|id| id.parse::<Uuid>().ok())
        .ok_or_else(|| {
            warn!(target = "varco::http", "login payload carried no user id");
            ApiError::internal(&state.messages, None)
        })?;

    let token = state.sessions.issue(user_id);
    debug!(target = "varco::http", user = %user_id, "session issued");
    Ok(Json(LoginResponse { token, user }))
}

/// POST /auth/logout. Revoking an unknown token still succeeds.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    if let Some(token) = bearer_token(&headers) {
        state.sessions.revoke(token);
    }
    StatusCode::NO_CONTENT
}
