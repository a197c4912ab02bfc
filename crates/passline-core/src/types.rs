use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Tenant identifier — every order and every connection is scoped to a venue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VenueId(pub String);

impl VenueId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VenueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VenueId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VenueId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Staff member identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Order identifier (UUIDv7 — time-sortable for easier log correlation).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Per-connection identifier (random UUID, never persisted).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnId(pub String);

impl ConnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Staff role hierarchy: owner > manager > staff.
///
/// Controls which venue operations are available without a DB lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    Owner,
    Manager,
    #[default]
    Staff,
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaffRole::Owner => write!(f, "owner"),
            StaffRole::Manager => write!(f, "manager"),
            StaffRole::Staff => write!(f, "staff"),
        }
    }
}

impl std::str::FromStr for StaffRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "owner" => Ok(StaffRole::Owner),
            "manager" => Ok(StaffRole::Manager),
            "staff" => Ok(StaffRole::Staff),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Order lifecycle state.
///
/// The progression is strictly forward: New → Preparing → Ready → Served.
/// Deserialization is the input boundary for the legacy numeric codes some
/// stored documents still carry; the mapping itself lives in
/// [`crate::status`], never in reconciliation or broadcast logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    Preparing,
    Ready,
    Served,
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = serde_json::Value::deserialize(deserializer)?;
        crate::status::normalize(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid order status: {raw}")))
    }
}

impl OrderStatus {
    /// The next state in the lifecycle, or `None` once served.
    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::New => Some(OrderStatus::Preparing),
            OrderStatus::Preparing => Some(OrderStatus::Ready),
            OrderStatus::Ready => Some(OrderStatus::Served),
            OrderStatus::Served => None,
        }
    }

    /// Whether `next` is the single legal forward transition from `self`.
    pub fn advances_to(&self, next: OrderStatus) -> bool {
        self.next() == Some(next)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Served => "served",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "new" => Ok(OrderStatus::New),
            "preparing" => Ok(OrderStatus::Preparing),
            "ready" => Ok(OrderStatus::Ready),
            "served" => Ok(OrderStatus::Served),
            other => Err(format!("unknown order status: {}", other)),
        }
    }
}

/// A single line item on an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    /// Unit price in minor currency units (cents).
    pub unit_price: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A venue order as stored by the system of record.
///
/// `updated_at` is non-decreasing as observed by any single client; the
/// status timestamps are stamped by the persistence layer when each
/// transition is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub venue_id: VenueId,
    pub table_number: u32,
    pub order_number: u32,
    pub items: Vec<OrderItem>,
    /// Sum of line totals in minor currency units.
    pub total_amount: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prepared_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub served_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// What kind of lifecycle change an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    OrderCreated,
    OrderStatusChanged,
    OrderUpdated,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::OrderCreated => "order_created",
            EventKind::OrderStatusChanged => "order_status_changed",
            EventKind::OrderUpdated => "order_updated",
        }
    }
}

/// Detail payload attached to a [`DomainEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChangeDetails {
    /// Old/new pair for a status transition.
    #[serde(rename_all = "camelCase")]
    Status {
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    /// Field → new value map for a general edit.
    Fields(BTreeMap<String, serde_json::Value>),
}

/// Immutable record of one order lifecycle change.
///
/// Events are ordered by emission within a venue; nothing is promised
/// across venues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    pub kind: EventKind,
    pub order_id: OrderId,
    /// Full order snapshot at emission time.
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<ChangeDetails>,
    pub emitted_at: DateTime<Utc>,
}

impl DomainEvent {
    pub fn created(order: Order) -> Self {
        Self {
            kind: EventKind::OrderCreated,
            order_id: order.id.clone(),
            order,
            changes: None,
            emitted_at: Utc::now(),
        }
    }

    pub fn status_changed(order: Order, old: OrderStatus, new: OrderStatus) -> Self {
        Self {
            kind: EventKind::OrderStatusChanged,
            order_id: order.id.clone(),
            order,
            changes: Some(ChangeDetails::Status {
                old_status: old,
                new_status: new,
            }),
            emitted_at: Utc::now(),
        }
    }

    pub fn updated(order: Order, changes: BTreeMap<String, serde_json::Value>) -> Self {
        Self {
            kind: EventKind::OrderUpdated,
            order_id: order.id.clone(),
            order,
            changes: Some(ChangeDetails::Fields(changes)),
            emitted_at: Utc::now(),
        }
    }
}
