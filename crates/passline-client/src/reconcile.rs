//! Canonical/optimistic merge — the view model is computed here and
//! nowhere else.
//!
//! A just-performed local status change must never be visually reverted
//! by a canonical refresh that has not yet caught up, but must self-heal
//! once canonical data converges or the mutation goes stale.

use chrono::{DateTime, Utc};
use passline_core::types::Order;

use crate::pending::PendingMutations;

/// Merge one canonical snapshot with the outstanding mutations.
///
/// For every canonical order: a resolved mutation (canonical status equals
/// the desired status) is dropped and the order emitted unchanged; an
/// unresolved one overrides the rendered status and bumps `updated_at` to
/// `now`; orders without a mutation pass through untouched. Mutations for
/// orders absent from the snapshot stay pending until canonical data
/// catches up or the staleness GC claims them — no placeholder rows.
///
/// Idempotent: a second run on identical inputs yields identical output.
/// The descending-`created_at` sort is a display concern only.
pub fn reconcile(
    canonical: &[Order],
    pending: &mut PendingMutations,
    now: DateTime<Utc>,
) -> Vec<Order> {
    pending.gc(now);

    let mut view = Vec::with_capacity(canonical.len());
    for order in canonical {
        match pending.get(&order.id) {
            Some(p) if p.desired_status == order.status => {
                pending.resolve(&order.id);
                view.push(order.clone());
            }
            Some(p) => {
                let mut overridden = order.clone();
                overridden.status = p.desired_status;
                overridden.updated_at = now;
                view.push(overridden);
            }
            None => view.push(order.clone()),
        }
    }

    view.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use passline_core::types::{OrderId, OrderStatus, VenueId};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap()
    }

    fn order(id: &str, status: OrderStatus, created_offset_secs: i64) -> Order {
        Order {
            id: OrderId::from(id),
            venue_id: VenueId::from("v-1"),
            table_number: 1,
            order_number: 1,
            items: vec![],
            total_amount: 0,
            status,
            created_at: t0() + Duration::seconds(created_offset_secs),
            prepared_at: None,
            ready_at: None,
            served_at: None,
            updated_at: t0(),
        }
    }

    #[test]
    fn lagging_canonical_does_not_revert_optimistic_change() {
        let mut pending = PendingMutations::new();
        pending.apply(OrderId::from("o-2"), OrderStatus::Preparing, t0());

        // server still says New — lagging behind the local change
        let canonical = vec![order("o-2", OrderStatus::New, 0)];
        let view = reconcile(&canonical, &mut pending, t0() + Duration::seconds(10));

        assert_eq!(view[0].status, OrderStatus::Preparing);
        assert_eq!(view[0].updated_at, t0() + Duration::seconds(10));
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn mutation_resolves_on_first_canonical_match() {
        let mut pending = PendingMutations::new();
        pending.apply(OrderId::from("o-1"), OrderStatus::Preparing, t0());

        let canonical = vec![order("o-1", OrderStatus::Preparing, 0)];
        let view = reconcile(&canonical, &mut pending, t0() + Duration::seconds(10));

        assert_eq!(view[0].status, OrderStatus::Preparing);
        // updated_at untouched once resolved
        assert_eq!(view[0].updated_at, t0());
        assert!(pending.is_empty());
    }

    #[test]
    fn stale_mutation_is_purged_even_without_convergence() {
        let mut pending = PendingMutations::new();
        pending.apply(OrderId::from("o-1"), OrderStatus::Preparing, t0());

        let canonical = vec![order("o-1", OrderStatus::New, 0)];
        let view = reconcile(&canonical, &mut pending, t0() + Duration::seconds(301));

        // the write likely failed — canonical wins again
        assert_eq!(view[0].status, OrderStatus::New);
        assert!(pending.is_empty());
    }

    #[test]
    fn mutation_for_absent_order_stays_pending() {
        let mut pending = PendingMutations::new();
        pending.apply(OrderId::from("ghost"), OrderStatus::Preparing, t0());

        let view = reconcile(&[], &mut pending, t0() + Duration::seconds(10));

        // no synthesized placeholder row
        assert!(view.is_empty());
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn merge_is_idempotent() {
        let mut pending = PendingMutations::new();
        pending.apply(OrderId::from("o-1"), OrderStatus::Ready, t0());
        pending.apply(OrderId::from("o-2"), OrderStatus::Preparing, t0());

        let canonical = vec![
            order("o-1", OrderStatus::Ready, 0), // resolves on first pass
            order("o-2", OrderStatus::New, 10),
            order("o-3", OrderStatus::Served, 20),
        ];
        let now = t0() + Duration::seconds(30);

        let first = reconcile(&canonical, &mut pending, now);
        let second = reconcile(&canonical, &mut pending, now);
        assert_eq!(first, second);
    }

    #[test]
    fn view_is_sorted_newest_first() {
        let mut pending = PendingMutations::new();
        let canonical = vec![
            order("oldest", OrderStatus::New, 0),
            order("newest", OrderStatus::New, 100),
            order("middle", OrderStatus::New, 50),
        ];
        let view = reconcile(&canonical, &mut pending, t0());
        let ids: Vec<_> = view.iter().map(|o| o.id.as_str().to_string()).collect();
        assert_eq!(ids, ["newest", "middle", "oldest"]);
    }
}
