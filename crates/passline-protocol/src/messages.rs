//! Realtime wire protocol.
//!
//! Field names are camelCase on the wire (the kitchen-display frontends
//! predate this server); message type tags are snake_case. Both are pinned
//! by `tests/wire_compat.rs` — changing either breaks deployed displays.

use chrono::{DateTime, Utc};
use passline_core::types::{ChangeDetails, DomainEvent, Order, OrderId, OrderStatus, VenueId};
use serde::{Deserialize, Serialize};

/// WebSocket close code for auth failure or venue-scope mismatch. No retry.
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;
/// WebSocket close code for stale-connection timeout or server shutdown.
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// Client → Server messages.
///
/// Unknown `type` tags fail to parse; the gateway logs and ignores them
/// without closing the connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Application-level heartbeat; resets the liveness clock.
    Ping,
    /// Toggle domain-event pushes for this connection.
    SubscribeNotifications { enabled: bool },
    /// Ask the gateway to relay the canonical active-order snapshot.
    RequestActiveOrders,
}

/// Per-status order tally sent with `active_orders_update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusCounts {
    pub new: usize,
    pub preparing: usize,
    pub ready: usize,
    pub served: usize,
}

impl StatusCounts {
    pub fn tally(orders: &[Order]) -> Self {
        let mut counts = Self::default();
        for order in orders {
            match order.status {
                OrderStatus::New => counts.new += 1,
                OrderStatus::Preparing => counts.preparing += 1,
                OrderStatus::Ready => counts.ready += 1,
                OrderStatus::Served => counts.served += 1,
            }
        }
        counts
    }
}

/// Body shared by the three domain push types and replay entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPush {
    pub order_id: OrderId,
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<ChangeDetails>,
    /// Event name, duplicated from the type tag for older display builds.
    pub event: String,
    pub timestamp: DateTime<Utc>,
    /// Present only when the push was served from the replay cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
}

/// Server → Client messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First frame after successful registration.
    #[serde(rename_all = "camelCase")]
    ConnectionEstablished {
        venue_id: VenueId,
        timestamp: DateTime<Utc>,
        active_connections: usize,
    },
    Pong {
        timestamp: DateTime<Utc>,
    },
    /// One-time replay of recently missed events, oldest first.
    CachedUpdates {
        updates: Vec<OrderPush>,
        count: usize,
    },
    ActiveOrdersUpdate {
        orders: Vec<Order>,
        counts: StatusCounts,
    },
    OrderCreated(OrderPush),
    OrderStatusChanged(OrderPush),
    OrderUpdated(OrderPush),
}

impl ServerMessage {
    /// Wrap a domain event as the matching push message.
    ///
    /// `cached_at` is set when the event is being replayed rather than
    /// delivered live.
    pub fn from_event(event: &DomainEvent, cached_at: Option<DateTime<Utc>>) -> Self {
        let push = OrderPush {
            order_id: event.order_id.clone(),
            order: event.order.clone(),
            changes: event.changes.clone(),
            event: event.kind.as_str().to_string(),
            timestamp: event.emitted_at,
            cached_at,
        };
        match event.kind {
            passline_core::types::EventKind::OrderCreated => ServerMessage::OrderCreated(push),
            passline_core::types::EventKind::OrderStatusChanged => {
                ServerMessage::OrderStatusChanged(push)
            }
            passline_core::types::EventKind::OrderUpdated => ServerMessage::OrderUpdated(push),
        }
    }

    /// Serialize for the wire. Infallible for owned message types.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
