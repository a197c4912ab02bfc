use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use passline_core::config::PENDING_MAX_AGE_SECS;
use passline_core::types::{OrderId, OrderStatus};

/// A locally applied status change not yet confirmed by the system of record.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMutation {
    pub order_id: OrderId,
    pub desired_status: OrderStatus,
    pub applied_at: DateTime<Utc>,
}

/// Outstanding optimistic mutations, at most one per order — a newer
/// mutation on the same order supersedes the old one.
#[derive(Debug, Default)]
pub struct PendingMutations {
    map: HashMap<OrderId, PendingMutation>,
}

impl PendingMutations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mutation, superseding any earlier one for the same order.
    pub fn apply(&mut self, order_id: OrderId, desired_status: OrderStatus, now: DateTime<Utc>) {
        self.map.insert(
            order_id.clone(),
            PendingMutation {
                order_id,
                desired_status,
                applied_at: now,
            },
        );
    }

    pub fn get(&self, order_id: &OrderId) -> Option<&PendingMutation> {
        self.map.get(order_id)
    }

    /// Drop a mutation once canonical state has caught up with it.
    pub fn resolve(&mut self, order_id: &OrderId) {
        self.map.remove(order_id);
    }

    /// Staleness GC: purge mutations older than five minutes — the write
    /// was likely lost, and the canonical state must win again.
    pub fn gc(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::seconds(PENDING_MAX_AGE_SECS);
        self.map.retain(|_, p| p.applied_at >= cutoff);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap()
    }

    #[test]
    fn latest_mutation_supersedes() {
        let mut pending = PendingMutations::new();
        let id = OrderId::from("o-1");
        pending.apply(id.clone(), OrderStatus::Preparing, t0());
        pending.apply(id.clone(), OrderStatus::Ready, t0() + Duration::seconds(5));

        assert_eq!(pending.len(), 1);
        assert_eq!(
            pending.get(&id).unwrap().desired_status,
            OrderStatus::Ready
        );
    }

    #[test]
    fn gc_purges_only_stale_entries() {
        let mut pending = PendingMutations::new();
        pending.apply(OrderId::from("old"), OrderStatus::Preparing, t0());
        pending.apply(
            OrderId::from("fresh"),
            OrderStatus::Preparing,
            t0() + Duration::seconds(240),
        );

        // 301s after the first entry: only it is past the 5 minute cutoff
        pending.gc(t0() + Duration::seconds(301));
        assert!(pending.get(&OrderId::from("old")).is_none());
        assert!(pending.get(&OrderId::from("fresh")).is_some());
    }

    #[test]
    fn gc_keeps_entry_at_exactly_the_cutoff() {
        let mut pending = PendingMutations::new();
        pending.apply(OrderId::from("o-1"), OrderStatus::Preparing, t0());
        pending.gc(t0() + Duration::seconds(300));
        assert_eq!(pending.len(), 1);
    }
}
