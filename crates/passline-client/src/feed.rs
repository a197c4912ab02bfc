use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use passline_core::types::{Order, OrderId, OrderStatus, VenueId};
use passline_protocol::messages::ServerMessage;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::OrdersApi;
use crate::error::{ClientError, Result};
use crate::pending::PendingMutations;
use crate::reconcile::reconcile;
use crate::undo::UndoCoordinator;

/// What the display renders: the reconciled view plus feed health.
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    pub orders: Vec<Order>,
    /// Set when the last canonical fetch failed; the orders shown are the
    /// last known good state.
    pub degraded: bool,
    pub refreshed_at: DateTime<Utc>,
}

struct FeedState {
    canonical: Vec<Order>,
    pending: PendingMutations,
    undo: UndoCoordinator,
    degraded: bool,
}

/// The single source of truth for what a kitchen display renders.
///
/// Canonical polls and pushed realtime events both funnel through the
/// same reconcile step — the pending-mutation overlay is never skipped
/// regardless of which source triggered the refresh. Two in-flight polls
/// landing out of order are last-write-wins per snapshot; an accepted,
/// documented risk.
pub struct OrderFeed {
    api: Arc<dyn OrdersApi>,
    venue_id: VenueId,
    poll_interval: StdDuration,
    state: Mutex<FeedState>,
    view_tx: watch::Sender<FeedSnapshot>,
}

impl OrderFeed {
    pub fn new(
        api: Arc<dyn OrdersApi>,
        venue_id: VenueId,
        poll_interval: StdDuration,
    ) -> (Arc<Self>, watch::Receiver<FeedSnapshot>) {
        let (view_tx, view_rx) = watch::channel(FeedSnapshot {
            orders: Vec::new(),
            degraded: false,
            refreshed_at: Utc::now(),
        });
        let feed = Arc::new(Self {
            api,
            venue_id,
            poll_interval,
            state: Mutex::new(FeedState {
                canonical: Vec::new(),
                pending: PendingMutations::new(),
                undo: UndoCoordinator::new(),
                degraded: false,
            }),
            view_tx,
        });
        (feed, view_rx)
    }

    /// Poll loop — ticks immediately, then every `poll_interval`.
    /// Cancellation is lifecycle-scoped: tear the view down, cancel the
    /// token, and the timer dies with it.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!(venue_id = %self.venue_id, "order feed started");
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(venue_id = %self.venue_id, "order feed stopped");
                    break;
                }
                _ = interval.tick() => {
                    self.refresh().await;
                }
            }
        }
    }

    /// Fetch the canonical snapshot and re-reconcile.
    ///
    /// Failure degrades gracefully: the last known state stays on screen,
    /// the snapshot is flagged, and the next tick retries.
    pub async fn refresh(&self) {
        match self.api.list_orders(&self.venue_id).await {
            Ok(orders) => {
                let mut state = self.state.lock().unwrap();
                state.canonical = orders;
                state.degraded = false;
                self.publish(&mut state, Utc::now());
            }
            Err(e) => {
                warn!(venue_id = %self.venue_id, error = %e, "canonical fetch failed — keeping last state");
                let mut state = self.state.lock().unwrap();
                state.degraded = true;
                self.publish(&mut state, Utc::now());
            }
        }
    }

    /// Feed one pushed realtime message into the view.
    pub fn handle_server_message(&self, msg: ServerMessage) {
        match msg {
            ServerMessage::OrderCreated(push)
            | ServerMessage::OrderStatusChanged(push)
            | ServerMessage::OrderUpdated(push) => self.ingest(push.order),
            ServerMessage::CachedUpdates { updates, .. } => {
                for push in updates {
                    self.ingest(push.order);
                }
            }
            ServerMessage::ActiveOrdersUpdate { orders, .. } => {
                let mut state = self.state.lock().unwrap();
                state.canonical = orders;
                self.publish(&mut state, Utc::now());
            }
            ServerMessage::ConnectionEstablished { .. } | ServerMessage::Pong { .. } => {}
        }
    }

    /// Apply a user-initiated status change optimistically and persist it
    /// in the background.
    ///
    /// A remote failure does not revert the optimistic state — it is
    /// logged and left standing; the staleness GC reconverges within five
    /// minutes if the write was really lost.
    pub fn mark_status(self: &Arc<Self>, order_id: OrderId, new_status: OrderStatus) -> Result<()> {
        let now = Utc::now();
        {
            let mut state = self.state.lock().unwrap();
            let previous = effective_status(&state, &order_id).ok_or_else(|| {
                ClientError::UnknownOrder {
                    id: order_id.to_string(),
                }
            })?;
            state
                .undo
                .record(order_id.clone(), previous, new_status, now);
            state.pending.apply(order_id.clone(), new_status, now);
            self.publish(&mut state, now);
        }

        let feed = Arc::clone(self);
        tokio::spawn(async move {
            match feed.api.update_status(&order_id, new_status).await {
                Ok(_) => debug!(order_id = %order_id, status = %new_status, "status update confirmed"),
                Err(e) => error!(
                    order_id = %order_id,
                    status = %new_status,
                    error = %e,
                    "remote status update failed — optimistic state left standing"
                ),
            }
        });
        Ok(())
    }

    /// Reverse the most recent mutation, if its window is still open.
    ///
    /// Undo is a new forward mutation carrying the previous status, not a
    /// rollback — it flows through the same optimistic path and clears
    /// the affordance. Returns whether anything was undone.
    pub fn undo(self: &Arc<Self>) -> bool {
        let now = Utc::now();
        let token = {
            let mut state = self.state.lock().unwrap();
            match state.undo.take(now) {
                Some(token) => {
                    state
                        .pending
                        .apply(token.order_id.clone(), token.previous_status, now);
                    self.publish(&mut state, now);
                    token
                }
                None => return false,
            }
        };

        let feed = Arc::clone(self);
        tokio::spawn(async move {
            match feed
                .api
                .update_status(&token.order_id, token.previous_status)
                .await
            {
                Ok(_) => debug!(order_id = %token.order_id, "undo persisted"),
                Err(e) => error!(
                    order_id = %token.order_id,
                    error = %e,
                    "remote undo failed — optimistic state left standing"
                ),
            }
        });
        true
    }

    /// Whether the undo affordance should currently be shown.
    pub fn undo_available(&self) -> bool {
        self.state.lock().unwrap().undo.available(Utc::now())
    }

    /// Outstanding optimistic mutations (UI badge / diagnostics).
    pub fn pending_count(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    /// Upsert one pushed order snapshot into the canonical set.
    fn ingest(&self, order: Order) {
        let mut state = self.state.lock().unwrap();
        match state.canonical.iter_mut().find(|o| o.id == order.id) {
            Some(existing) => *existing = order,
            None => state.canonical.push(order),
        }
        self.publish(&mut state, Utc::now());
    }

    /// Reconcile and publish — the last step applied to any freshly
    /// arrived canonical data, on every path.
    fn publish(&self, state: &mut FeedState, now: DateTime<Utc>) {
        let orders = reconcile(&state.canonical, &mut state.pending, now);
        self.view_tx.send_replace(FeedSnapshot {
            orders,
            degraded: state.degraded,
            refreshed_at: now,
        });
    }
}

fn effective_status(state: &FeedState, order_id: &OrderId) -> Option<OrderStatus> {
    if let Some(p) = state.pending.get(order_id) {
        return Some(p.desired_status);
    }
    state
        .canonical
        .iter()
        .find(|o| o.id == *order_id)
        .map(|o| o.status)
}
