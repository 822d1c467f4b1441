use std::process;
use std::sync::Arc;

use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

use varco::application::error::AppError;
use varco::application::locale::Catalog;
use varco::cache::{
    CacheAccessor, CacheConfig, CacheStore, Invalidator, PushBus, PushChannel, PushChannelConfig,
};
use varco::config;
use varco::infra::error::InfraError;
use varco::infra::http::{self, AppState, SessionStore};
use varco::infra::telemetry;
use varco::infra::upstream::ApiClient;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (_cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    let cache_config = CacheConfig::from(&settings.cache);
    let store = Arc::new(CacheStore::new(&cache_config));
    let accessor = Arc::new(CacheAccessor::new(cache_config, Arc::clone(&store)));
    let invalidator = Arc::new(Invalidator::new(Arc::clone(&store)));

    let push_config = PushChannelConfig::from(&settings.push);
    let bus = Arc::new(PushBus::new(push_config.buffer));
    let channel = PushChannel::new(push_config, Arc::clone(&invalidator), Arc::clone(&bus));
    let channel_task = channel.spawn();
    if channel_task.is_none() {
        info!("push channel disabled, cache relies on TTL expiry alone");
    }

    let upstream = Arc::new(ApiClient::new(
        settings.upstream.base_url.clone(),
        settings.upstream.timeout,
        settings.upstream.service_token.clone(),
    )?);

    let state = AppState {
        accessor,
        invalidator,
        upstream,
        sessions: Arc::new(SessionStore::new()),
        bus,
        messages: Arc::new(Catalog::new(settings.locale.default.clone())),
    };
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::Io)?;
    info!(addr = %settings.server.addr, "varco listening");

    axum::serve(listener, router)
        .await
        .map_err(|err| AppError::unexpected(format!("server terminated: {err}")))?;

    if let Some(task) = channel_task {
        task.abort();
    }
    Ok(())
}
