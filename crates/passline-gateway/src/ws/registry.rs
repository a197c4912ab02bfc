use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use passline_core::types::{ConnId, StaffRole, UserId, VenueId};
use tokio::sync::mpsc;
use tracing::debug;

/// Commands drained by the connection task into the socket.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// A serialized server message.
    Frame(String),
    /// WS protocol-level Ping — the health monitor's liveness probe.
    Probe,
    /// Close the socket with the given code and reason.
    Close { code: u16, reason: &'static str },
}

/// One live subscriber connection.
///
/// Owned by the registry from `register` to `unregister`; the connection
/// task and the health monitor only ever hold `Arc`s.
pub struct ConnectionHandle {
    pub conn_id: ConnId,
    pub venue_id: VenueId,
    pub user_id: UserId,
    pub role: StaffRole,
    sender: mpsc::Sender<Outbound>,
    /// Unix millis of the last client heartbeat (ping or probe pong).
    last_ping_at: AtomicI64,
    /// Set while a probe is outstanding; cleared by the next heartbeat.
    probe_sent: AtomicBool,
    /// Whether this connection wants domain-event pushes.
    wants_pushes: AtomicBool,
}

impl ConnectionHandle {
    pub fn new(
        venue_id: VenueId,
        user_id: UserId,
        role: StaffRole,
        sender: mpsc::Sender<Outbound>,
        now_ms: i64,
    ) -> Arc<Self> {
        Arc::new(Self {
            conn_id: ConnId::new(),
            venue_id,
            user_id,
            role,
            sender,
            last_ping_at: AtomicI64::new(now_ms),
            probe_sent: AtomicBool::new(false),
            wants_pushes: AtomicBool::new(true),
        })
    }

    /// Non-blocking send; a full or closed queue is the caller's signal to prune.
    pub fn try_send(&self, out: Outbound) -> Result<(), mpsc::error::TrySendError<Outbound>> {
        self.sender.try_send(out)
    }

    /// Record a heartbeat and clear any outstanding probe.
    pub fn touch(&self, now_ms: i64) {
        self.last_ping_at.store(now_ms, Ordering::Relaxed);
        self.probe_sent.store(false, Ordering::Relaxed);
    }

    pub fn last_ping_at(&self) -> i64 {
        self.last_ping_at.load(Ordering::Relaxed)
    }

    pub fn probe_sent(&self) -> bool {
        self.probe_sent.load(Ordering::Relaxed)
    }

    pub fn mark_probe_sent(&self) {
        self.probe_sent.store(true, Ordering::Relaxed);
    }

    pub fn set_wants_pushes(&self, enabled: bool) {
        self.wants_pushes.store(enabled, Ordering::Relaxed);
    }

    pub fn wants_pushes(&self) -> bool {
        self.wants_pushes.load(Ordering::Relaxed)
    }
}

/// Live subscriber connections grouped by venue.
///
/// A venue key exists exactly while it has at least one connection —
/// `unregister` deletes the key when the set empties, so an idle venue
/// costs nothing.
pub struct ConnectionRegistry {
    venues: DashMap<VenueId, HashMap<ConnId, Arc<ConnectionHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            venues: DashMap::new(),
        }
    }

    /// Add a connection under its venue. Returns the venue's live count.
    pub fn register(&self, handle: Arc<ConnectionHandle>) -> usize {
        let mut entry = self.venues.entry(handle.venue_id.clone()).or_default();
        entry.insert(handle.conn_id.clone(), handle.clone());
        let count = entry.len();
        debug!(venue_id = %handle.venue_id, conn_id = %handle.conn_id, count, "connection registered");
        count
    }

    /// Remove a connection; drops the venue key when its set empties.
    pub fn unregister(&self, venue_id: &VenueId, conn_id: &ConnId) {
        let emptied = match self.venues.get_mut(venue_id) {
            Some(mut conns) => {
                conns.remove(conn_id);
                conns.is_empty()
            }
            None => return,
        };
        if emptied {
            self.venues.remove_if(venue_id, |_, conns| conns.is_empty());
        }
        debug!(venue_id = %venue_id, conn_id = %conn_id, "connection unregistered");
    }

    /// Snapshot of a venue's live handles (empty when the venue is idle).
    pub fn venue_connections(&self, venue_id: &VenueId) -> Vec<Arc<ConnectionHandle>> {
        self.venues
            .get(venue_id)
            .map(|conns| conns.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn venue_count(&self, venue_id: &VenueId) -> usize {
        self.venues.get(venue_id).map(|c| c.len()).unwrap_or(0)
    }

    pub fn has_venue(&self, venue_id: &VenueId) -> bool {
        self.venues.contains_key(venue_id)
    }

    /// Number of venues with at least one live connection.
    pub fn venues(&self) -> usize {
        self.venues.len()
    }

    /// Snapshot of every live handle, for the health sweep.
    pub fn all_connections(&self) -> Vec<Arc<ConnectionHandle>> {
        self.venues
            .iter()
            .flat_map(|entry| entry.value().values().cloned().collect::<Vec<_>>())
            .collect()
    }

    pub fn total_connections(&self) -> usize {
        self.venues.iter().map(|entry| entry.value().len()).sum()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
