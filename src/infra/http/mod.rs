//! HTTP surface: router assembly, session middleware, and the JSON error
//! envelope.

use axum::Router;
use axum::routing::{get, post};
use axum::{Json, middleware};

pub mod error;
pub mod handlers;
pub mod session;
pub mod sse;
pub mod state;

pub use error::ApiError;
pub use session::SessionStore;
pub use state::AppState;

pub fn build_router(state: AppState) -> Router {
    let profile = Router::new()
        .route("/profile/events", get(handlers::profile::events))
        .route("/profile/plugins", get(handlers::profile::plugins))
        .route(
            "/profile/plugins/{id}/enable",
            post(handlers::profile::enable_plugin),
        )
        .route(
            "/profile/plugins/{id}/disable",
            post(handlers::profile::disable_plugin),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session::require_session,
        ));

    let api = Router::new()
        .route(
            "/users",
            get(handlers::users::list).post(handlers::users::create),
        )
        .route("/users/count", get(handlers::users::count))
        .route(
            "/users/{id}",
            get(handlers::users::detail)
                .put(handlers::users::update)
                .delete(handlers::users::delete),
        )
        .route("/roles", get(handlers::roles::list))
        .route("/roles/count", get(handlers::roles::count))
        .route("/roles/{id}", get(handlers::roles::detail))
        .route(
            "/workplaces",
            get(handlers::workplaces::list).post(handlers::workplaces::create),
        )
        .route("/workplaces/count", get(handlers::workplaces::count))
        .route(
            "/workplaces/{workplace_id}",
            get(handlers::workplaces::detail)
                .put(handlers::workplaces::update)
                .delete(handlers::workplaces::delete),
        )
        .route(
            "/workplaces/{workplace_id}/folders",
            get(handlers::folders::list).post(handlers::folders::create),
        )
        .route(
            "/workplaces/{workplace_id}/folders/{folder_id}",
            get(handlers::folders::detail).delete(handlers::folders::delete),
        )
        .route("/blog", get(handlers::blog::list))
        .route("/blog/count", get(handlers::blog::count))
        .route("/blog/{id}", get(handlers::blog::detail))
        .route("/media", get(handlers::media::list))
        .route("/media/{id}", get(handlers::media::detail))
        .route("/notifications", get(handlers::notifications::list))
        .route(
            "/notifications/count",
            get(handlers::notifications::count),
        )
        .route(
            "/notifications/{id}/read",
            post(handlers::notifications::mark_read),
        )
        .route("/events", get(sse::events))
        .merge(profile)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::attach_context,
        ));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/auth/login", post(session::login))
        .route("/auth/logout", post(session::logout))
        .nest("/api", api)
        .with_state(state)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
