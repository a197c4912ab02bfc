//! Legacy status-code adapter.
//!
//! Older kitchen-display builds stored order status as a bare integer
//! (0=new, 1=preparing, 2=ready, 3=served) and some venue documents still
//! carry that form. Every inbound status is normalised here, at the
//! boundary — reconciliation and broadcast only ever see [`OrderStatus`].

use serde_json::Value;

use crate::types::OrderStatus;

/// Map a legacy numeric code to a status. Unknown codes are rejected.
pub fn from_legacy_code(code: i64) -> Option<OrderStatus> {
    match code {
        0 => Some(OrderStatus::New),
        1 => Some(OrderStatus::Preparing),
        2 => Some(OrderStatus::Ready),
        3 => Some(OrderStatus::Served),
        _ => None,
    }
}

/// The numeric code written for clients still on the old schema.
pub fn to_legacy_code(status: OrderStatus) -> i64 {
    match status {
        OrderStatus::New => 0,
        OrderStatus::Preparing => 1,
        OrderStatus::Ready => 2,
        OrderStatus::Served => 3,
    }
}

/// Normalise a raw JSON status value — string name or legacy integer —
/// into the one tagged enum the rest of the system uses.
pub fn normalize(raw: &Value) -> Option<OrderStatus> {
    match raw {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_i64().and_then(from_legacy_code),
        _ => None,
    }
}
