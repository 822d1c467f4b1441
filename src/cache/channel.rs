//! Push invalidation channel: upstream SSE subscription.
//!
//! One supervised background task per process. It walks the
//! `Disconnected -> Connecting -> Connected` state machine, reconnecting
//! with exponential backoff after every drop. While connected, each inbound
//! event evicts the matching cache entries and is re-broadcast to browser
//! clients. Failures here are non-fatal: request handling continues and the
//! cache degrades to TTL expiry until the channel is back.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::config::PushChannelConfig;
use super::events::{PushBus, PushEvent, PushKind};
use super::invalidator::Invalidator;

pub(crate) const METRIC_PUSH_RECONNECT: &str = "varco_push_reconnect_total";
pub(crate) const METRIC_PUSH_EVENTS: &str = "varco_push_event_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("subscription request failed: {0}")]
    Connect(String),
    #[error("upstream closed the event stream")]
    Closed,
}

impl From<reqwest::Error> for ChannelError {
    fn from(error: reqwest::Error) -> Self {
        ChannelError::Connect(error.to_string())
    }
}

/// Upstream event subscription feeding the invalidator and the push bus.
pub struct PushChannel {
    config: PushChannelConfig,
    http: reqwest::Client,
    invalidator: Arc<Invalidator>,
    bus: Arc<PushBus>,
}

impl PushChannel {
    pub fn new(config: PushChannelConfig, invalidator: Arc<Invalidator>, bus: Arc<PushBus>) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            invalidator,
            bus,
        }
    }

    /// Start the channel as a detached background task. Returns `None` when
    /// no events URL is configured.
    pub fn spawn(self) -> Option<tokio::task::JoinHandle<()>> {
        self.config.events_url.as_ref()?;
        Some(tokio::spawn(async move { self.run().await }))
    }

    async fn run(self) {
        let Some(url) = self.config.events_url.clone() else {
            return;
        };
        let mut backoff = self.config.initial_backoff;

        loop {
            let mut state = ChannelState::Connecting;
            debug!(target = "varco::push", %url, state = ?state, "connecting");

            // consume_stream only returns on stream loss.
            let error = match self.consume_stream(url.as_str(), &mut state).await {
                Ok(()) => ChannelError::Closed,
                Err(error) => error,
            };
            let was_connected = state == ChannelState::Connected;
            warn!(
                target = "varco::push",
                error = %error,
                retry_in_ms = backoff.as_millis() as u64,
                "push channel disconnected"
            );
            counter!(METRIC_PUSH_RECONNECT).increment(1);
            tokio::time::sleep(backoff).await;
            backoff = if was_connected {
                // A session that reached Connected earns a fresh ladder.
                self.config.initial_backoff
            } else {
                next_backoff(backoff, self.config.max_backoff)
            };
        }
    }

    async fn consume_stream(
        &self,
        url: &str,
        state: &mut ChannelState,
    ) -> Result<(), ChannelError> {
        let response = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let response = response.error_for_status()?;

        *state = ChannelState::Connected;
        info!(target = "varco::push", "push channel connected");

        let mut frames = SseFrameParser::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            for payload in frames.push_chunk(&chunk) {
                self.handle_payload(&payload);
            }
        }
        Err(ChannelError::Closed)
    }

    fn handle_payload(&self, payload: &str) {
        let event: PushEvent = match serde_json::from_str(payload) {
            Ok(event) => event,
            Err(error) => {
                warn!(target = "varco::push", error = %error, "unparseable push event dropped");
                return;
            }
        };
        counter!(METRIC_PUSH_EVENTS, "kind" => match event.kind {
            PushKind::Invalidate => "invalidate",
            PushKind::Refresh => "refresh",
        })
        .increment(1);
        self.apply(&event);
        self.bus.publish(event);
    }

    /// Map one event onto the invalidator. Both kinds evict: a `Refresh` is
    /// an invalidation that additionally asks the UI to re-render.
    fn apply(&self, event: &PushEvent) {
        match &event.entity_id {
            Some(id) => {
                self.invalidator
                    .invalidate_entity_scoped(event.resource, event.scope, id)
            }
            None => self
                .invalidator
                .invalidate_collection_scoped(event.resource, event.scope),
        }
    }
}

fn next_backoff(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}

/// Incremental parser for `text/event-stream` framing.
///
/// Only `data:` fields matter here; multi-line data is joined with newlines,
/// comments and other fields are skipped. A blank line dispatches the frame.
struct SseFrameParser {
    line_buf: Vec<u8>,
    data_lines: Vec<String>,
}

impl SseFrameParser {
    fn new() -> Self {
        Self {
            line_buf: Vec::new(),
            data_lines: Vec::new(),
        }
    }

    fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut payloads = Vec::new();
        for byte in chunk {
            match byte {
                b'\n' => {
                    let raw = std::mem::take(&mut self.line_buf);
                    let line = String::from_utf8_lossy(&raw);
                    if let Some(payload) = self.push_line(line.trim_end_matches('\r')) {
                        payloads.push(payload);
                    }
                }
                _ => self.line_buf.push(*byte),
            }
        }
        payloads
    }

    fn push_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            if self.data_lines.is_empty() {
                return None;
            }
            return Some(std::mem::take(&mut self.data_lines).join("\n"));
        }
        if let Some(data) = line.strip_prefix("data:") {
            self.data_lines.push(data.strip_prefix(' ').unwrap_or(data).to_string());
        }
        // `event:`, `id:`, `retry:` and comments carry nothing we consume.
        None
    }
}
