use std::sync::Arc;

use chrono::Utc;
use passline_core::config::{CLOSE_AFTER_SECS, PROBE_AFTER_SECS, SWEEP_INTERVAL_SECS};
use passline_protocol::messages::CLOSE_GOING_AWAY;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::ws::registry::{ConnectionRegistry, Outbound};

/// What one sweep pass decided for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepAction {
    /// Heartbeat is fresh enough.
    Keep,
    /// Idle past the probe threshold — send a liveness probe.
    Probe,
    /// Idle past the close threshold — force-close.
    Close,
}

/// Decide the sweep action for a connection.
///
/// Sending a probe does not reset the liveness clock — only a heartbeat
/// from the client does — so a connection that never answers walks
/// Probe → Close on later sweeps. The close threshold is strict: a
/// connection idle exactly 300 s is kept for one more pass.
pub fn sweep_action(now_ms: i64, last_ping_ms: i64, probe_sent: bool) -> SweepAction {
    let age_ms = now_ms - last_ping_ms;
    if age_ms > CLOSE_AFTER_SECS * 1000 {
        SweepAction::Close
    } else if age_ms > PROBE_AFTER_SECS * 1000 && !probe_sent {
        SweepAction::Probe
    } else {
        SweepAction::Keep
    }
}

/// Periodic liveness sweep over the registry.
///
/// Single pass, non-reentrant: missed ticks are skipped rather than
/// bursting, so a slow sweep never stacks on itself.
pub struct HealthMonitor {
    registry: Arc<ConnectionRegistry>,
}

impl HealthMonitor {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Sweep loop. Runs until `shutdown` broadcasts `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("connection health monitor started");
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(SWEEP_INTERVAL_SECS));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.sweep(Utc::now().timestamp_millis());
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("connection health monitor shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One pass over every live connection.
    pub fn sweep(&self, now_ms: i64) {
        for conn in self.registry.all_connections() {
            match sweep_action(now_ms, conn.last_ping_at(), conn.probe_sent()) {
                SweepAction::Keep => {}
                SweepAction::Probe => {
                    debug!(conn_id = %conn.conn_id, "idle connection — sending probe");
                    if conn.try_send(Outbound::Probe).is_ok() {
                        conn.mark_probe_sent();
                    } else {
                        // channel already gone; the close path below is moot
                        self.registry.unregister(&conn.venue_id, &conn.conn_id);
                    }
                }
                SweepAction::Close => {
                    warn!(
                        conn_id = %conn.conn_id,
                        venue_id = %conn.venue_id,
                        "stale connection — closing"
                    );
                    if conn
                        .try_send(Outbound::Close {
                            code: CLOSE_GOING_AWAY,
                            reason: "connection timed out",
                        })
                        .is_err()
                    {
                        // the connection task is dead; unregister directly
                        self.registry.unregister(&conn.venue_id, &conn.conn_id);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use passline_core::types::{StaffRole, UserId, VenueId};
    use tokio::sync::mpsc;

    use crate::ws::registry::ConnectionHandle;

    const SEC: i64 = 1000;

    #[test]
    fn fresh_connection_is_kept() {
        assert_eq!(sweep_action(10 * SEC, 0, false), SweepAction::Keep);
        assert_eq!(sweep_action(60 * SEC, 0, false), SweepAction::Keep);
    }

    #[test]
    fn probe_after_sixty_seconds() {
        assert_eq!(sweep_action(61 * SEC, 0, false), SweepAction::Probe);
    }

    #[test]
    fn outstanding_probe_is_not_resent() {
        assert_eq!(sweep_action(61 * SEC, 0, true), SweepAction::Keep);
    }

    #[test]
    fn close_boundary_is_strict() {
        // 299s and exactly 300s: still kept alive (probe already out)
        assert_eq!(sweep_action(299 * SEC, 0, true), SweepAction::Keep);
        assert_eq!(sweep_action(300 * SEC, 0, true), SweepAction::Keep);
        // past 300s: closed regardless of probe state
        assert_eq!(sweep_action(300 * SEC + 1, 0, true), SweepAction::Close);
        assert_eq!(sweep_action(301 * SEC, 0, false), SweepAction::Close);
    }

    fn idle_handle(
        registry: &ConnectionRegistry,
        last_ping_ms: i64,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(8);
        let handle = ConnectionHandle::new(
            VenueId::from("v-1"),
            UserId::from("u-1"),
            StaffRole::Staff,
            tx,
            last_ping_ms,
        );
        registry.register(handle.clone());
        (handle, rx)
    }

    #[test]
    fn sweep_probes_idle_and_closes_stale() {
        let registry = Arc::new(ConnectionRegistry::new());
        let monitor = HealthMonitor::new(registry.clone());

        let (idle, mut idle_rx) = idle_handle(&registry, 0);
        let (stale, mut stale_rx) = idle_handle(&registry, -300 * SEC);

        monitor.sweep(61 * SEC);

        assert_eq!(idle_rx.try_recv().unwrap(), Outbound::Probe);
        assert!(idle.probe_sent());
        assert_eq!(
            stale_rx.try_recv().unwrap(),
            Outbound::Close {
                code: CLOSE_GOING_AWAY,
                reason: "connection timed out",
            }
        );
        // unregistering is the connection task's job on its close path
        assert_eq!(registry.venue_count(&stale.venue_id), 2);
    }

    #[test]
    fn sweep_unregisters_when_channel_is_gone() {
        let registry = Arc::new(ConnectionRegistry::new());
        let monitor = HealthMonitor::new(registry.clone());

        let (stale, stale_rx) = idle_handle(&registry, -301 * SEC);
        drop(stale_rx);

        monitor.sweep(0);
        assert_eq!(registry.venue_count(&stale.venue_id), 0);
    }

    #[test]
    fn pong_resets_the_cycle() {
        let registry = Arc::new(ConnectionRegistry::new());
        let monitor = HealthMonitor::new(registry.clone());
        let (conn, mut rx) = idle_handle(&registry, 0);

        monitor.sweep(61 * SEC);
        assert_eq!(rx.try_recv().unwrap(), Outbound::Probe);

        // client answers — back to Active, next sweep sends nothing
        conn.touch(62 * SEC);
        monitor.sweep(63 * SEC);
        assert!(rx.try_recv().is_err());
    }
}
