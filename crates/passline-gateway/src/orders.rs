use async_trait::async_trait;
use passline_core::types::{Order, VenueId};

/// Canonical active-order lookup, implemented by the persistence layer.
///
/// The gateway never owns order storage; it relays snapshots on
/// `request_active_orders` through whatever directory the embedding
/// process injects at startup.
#[async_trait]
pub trait OrderDirectory: Send + Sync {
    async fn active_orders(&self, venue_id: &VenueId) -> passline_core::Result<Vec<Order>>;
}

/// Placeholder directory for a standalone gateway process — every venue
/// reads as having no active orders.
pub struct EmptyDirectory;

#[async_trait]
impl OrderDirectory for EmptyDirectory {
    async fn active_orders(&self, _venue_id: &VenueId) -> passline_core::Result<Vec<Order>> {
        Ok(Vec::new())
    }
}
