//! Push events: the logical shape flowing through the invalidation channel.
//!
//! Events arrive from the upstream notification source, drive cache
//! eviction, and are re-broadcast to connected browser clients. Delivery is
//! fire-and-forget, at-most-once; a dropped event only costs one re-fetch on
//! the next read.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::types::{ResourceType, Scope};

/// What the client should do with the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushKind {
    /// Cached views of the resource are stale.
    Invalidate,
    /// The resource changed and the UI should re-render it.
    Refresh,
}

/// One upstream change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEvent {
    #[serde(rename = "resourceType")]
    pub resource: ResourceType,
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    pub kind: PushKind,
}

/// Fan-out point between the channel consumer and browser-facing streams.
///
/// Backed by a tokio broadcast channel: subscribers that lag past the buffer
/// lose events, which at-most-once delivery already permits.
pub struct PushBus {
    sender: broadcast::Sender<PushEvent>,
}

impl PushBus {
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer.max(1));
        Self { sender }
    }

    /// Publish to all current subscribers. Having none is not an error.
    pub fn publish(&self, event: PushEvent) {
        debug!(
            target = "varco::push",
            resource = event.resource.as_str(),
            scope = %event.scope,
            kind = ?event.kind,
            "push event broadcast"
        );
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn event_wire_shape_is_camel_case() {
        let event = PushEvent {
            resource: ResourceType::WorkspaceFolder,
            scope: Scope::Workplace(Uuid::nil()),
            entity_id: Some("f-3".into()),
            kind: PushKind::Invalidate,
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["resourceType"], "workspace-folder");
        assert_eq!(json["entityId"], "f-3");
        assert_eq!(json["kind"], "invalidate");
    }

    #[test]
    fn collection_event_omits_entity_id() {
        let event = PushEvent {
            resource: ResourceType::Blog,
            scope: Scope::Global,
            entity_id: None,
            kind: PushKind::Refresh,
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert!(json.get("entityId").is_none());

        let back: PushEvent =
            serde_json::from_str(r#"{"resourceType":"blog","scope":"global","kind":"refresh"}"#)
                .expect("deserialize");
        assert_eq!(back, event);
    }

    #[tokio::test]
    async fn bus_delivers_to_subscribers() {
        let bus = PushBus::new(8);
        let mut rx = bus.subscribe();

        let event = PushEvent {
            resource: ResourceType::User,
            scope: Scope::Global,
            entity_id: None,
            kind: PushKind::Invalidate,
        };
        bus.publish(event.clone());

        assert_eq!(rx.recv().await.expect("recv"), event);
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = PushBus::new(8);
        bus.publish(PushEvent {
            resource: ResourceType::Media,
            scope: Scope::Global,
            entity_id: None,
            kind: PushKind::Invalidate,
        });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
