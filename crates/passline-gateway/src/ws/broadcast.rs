use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use passline_core::types::{DomainEvent, Order, OrderId, OrderStatus, VenueId};
use passline_protocol::messages::ServerMessage;
use tracing::{debug, warn};

use crate::ws::registry::{ConnectionRegistry, Outbound};
use crate::ws::replay::ReplayCache;

/// Fan-out of domain events to a venue's live subscribers.
///
/// Every published event is appended to the replay cache whether or not
/// anyone is listening; delivery is non-blocking and a dead subscriber is
/// pruned in place rather than failing the publish.
pub struct EventBroadcaster {
    registry: Arc<ConnectionRegistry>,
    replay: ReplayCache,
}

impl EventBroadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            replay: ReplayCache::new(),
        }
    }

    /// Cache the event, then push it to every live subscriber of the venue.
    ///
    /// Events reach the cache and the sockets in caller dispatch order;
    /// nothing is promised across venues.
    pub fn publish(&self, venue_id: &VenueId, event: DomainEvent) {
        let now = Utc::now();
        let payload = ServerMessage::from_event(&event, None).to_json();
        self.replay.append(venue_id, event, now);

        let connections = self.registry.venue_connections(venue_id);
        if connections.is_empty() {
            debug!(venue_id = %venue_id, "no live subscribers — event cached only");
            return;
        }

        for conn in connections {
            if !conn.wants_pushes() {
                continue;
            }
            // Serialized once above; each subscriber gets the identical frame.
            if conn.try_send(Outbound::Frame(payload.clone())).is_err() {
                warn!(
                    venue_id = %venue_id,
                    conn_id = %conn.conn_id,
                    "subscriber queue closed or full — pruning connection"
                );
                self.registry.unregister(&conn.venue_id, &conn.conn_id);
            }
        }
    }

    /// The most recent `limit` cached events for one-time delivery at
    /// connection establishment.
    pub fn replay(&self, venue_id: &VenueId, limit: usize) -> Vec<ServerMessage> {
        self.replay
            .replay(venue_id, limit, Utc::now())
            .iter()
            .map(|cached| ServerMessage::from_event(&cached.event, Some(cached.cached_at)))
            .collect()
    }

    /// Raw cached entries, for the `cached_updates` envelope.
    pub fn cached_updates(&self, venue_id: &VenueId, limit: usize) -> ServerMessage {
        let updates: Vec<_> = self
            .replay
            .replay(venue_id, limit, Utc::now())
            .iter()
            .map(|cached| {
                match ServerMessage::from_event(&cached.event, Some(cached.cached_at)) {
                    ServerMessage::OrderCreated(p)
                    | ServerMessage::OrderStatusChanged(p)
                    | ServerMessage::OrderUpdated(p) => p,
                    // from_event only yields push variants
                    _ => unreachable!("from_event yields push messages"),
                }
            })
            .collect();
        ServerMessage::CachedUpdates {
            count: updates.len(),
            updates,
        }
    }

    // ------------------------------------------------------------------
    // Collaborator surface — called by the persistence layer after a
    // successful write, decoupling storage from fan-out.
    // ------------------------------------------------------------------

    pub fn notify_order_created(&self, venue_id: &VenueId, order: Order) {
        self.publish(venue_id, DomainEvent::created(order));
    }

    pub fn notify_order_status_changed(
        &self,
        venue_id: &VenueId,
        _order_id: &OrderId,
        old_status: OrderStatus,
        new_status: OrderStatus,
        order: Order,
    ) {
        self.publish(
            venue_id,
            DomainEvent::status_changed(order, old_status, new_status),
        );
    }

    pub fn notify_order_updated(
        &self,
        venue_id: &VenueId,
        _order_id: &OrderId,
        order: Order,
        changes: BTreeMap<String, serde_json::Value>,
    ) {
        self.publish(venue_id, DomainEvent::updated(order, changes));
    }
}
